// better-feature-test-utils: adapter conformance suite.
//
// Every adapter crate runs `AdapterTestSuite::conformance()` against its own
// adapter so that CRUD and Where semantics stay identical across backends.

pub mod fixtures;
pub mod suite;

pub use fixtures::{conformance_schema, tester_record, TESTER_MODEL};
pub use suite::{AdapterTestSuite, CaseResult, SuiteReport, TestCase};
