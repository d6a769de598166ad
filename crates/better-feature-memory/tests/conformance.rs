use std::sync::Arc;

use better_feature_memory::MemoryAdapter;
use better_feature_test_utils::{AdapterTestSuite, TESTER_MODEL};

#[tokio::test]
async fn memory_adapter_passes_conformance_suite() {
    let adapter = Arc::new(MemoryAdapter::with_tables([TESTER_MODEL]));
    let report = AdapterTestSuite::conformance().run(adapter).await;
    report.assert_all_passed();
    assert_eq!(report.passed(), AdapterTestSuite::conformance().len());
}
