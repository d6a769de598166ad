// SQL dialect detection and per-dialect syntax differences.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use better_feature_core::error::FeatureError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    Sqlite,
    Postgres,
    Mysql,
    Mssql,
}

impl DatabaseType {
    /// Guess the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?.to_lowercase();
        match scheme.as_str() {
            "sqlite" => Some(Self::Sqlite),
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" | "mariadb" => Some(Self::Mysql),
            "mssql" | "sqlserver" => Some(Self::Mssql),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Mssql => "mssql",
        }
    }

    /// Bind placeholder for the 1-based parameter `n`.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Self::Mysql => "?".to_string(),
            Self::Mssql => format!("@p{n}"),
            Self::Sqlite | Self::Postgres => format!("${n}"),
        }
    }

    pub fn quote(&self, ident: &str) -> String {
        match self {
            Self::Mysql => format!("`{}`", ident.replace('`', "")),
            Self::Mssql => format!("[{}]", ident.replace(['[', ']'], "")),
            Self::Sqlite | Self::Postgres => format!("\"{}\"", ident.replace('"', "")),
        }
    }

    /// Whether the engine stores real booleans.
    pub fn supports_booleans(&self) -> bool {
        !matches!(self, Self::Sqlite)
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseType {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::Mysql),
            "mssql" | "sqlserver" => Ok(Self::Mssql),
            other => Err(FeatureError::Configuration(format!(
                "Unknown database type \"{other}\""
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url() {
        assert_eq!(DatabaseType::from_url("sqlite::memory:"), Some(DatabaseType::Sqlite));
        assert_eq!(
            DatabaseType::from_url("postgresql://u@localhost/db"),
            Some(DatabaseType::Postgres)
        );
        assert_eq!(DatabaseType::from_url("mysql://localhost"), Some(DatabaseType::Mysql));
        assert_eq!(DatabaseType::from_url("redis://localhost"), None);
    }

    #[test]
    fn test_placeholders_and_quoting() {
        assert_eq!(DatabaseType::Postgres.placeholder(3), "$3");
        assert_eq!(DatabaseType::Mysql.placeholder(3), "?");
        assert_eq!(DatabaseType::Mssql.placeholder(3), "@p3");
        assert_eq!(DatabaseType::Mysql.quote("user"), "`user`");
        assert_eq!(DatabaseType::Sqlite.quote("a\"b"), "\"ab\"");
    }

    #[test]
    fn test_from_str() {
        assert_eq!("PG".parse::<DatabaseType>().unwrap(), DatabaseType::Postgres);
        assert!("oracle".parse::<DatabaseType>().is_err());
    }
}
