use crate::*;
use thiserror::Error;

const VALID_LOG_FORMATS: [&str; 3] = ["pretty", "json", "compact"];
const VALID_SSL_MODES: [&str; 6] = [
    "disable",
    "allow",
    "prefer",
    "require",
    "verify-ca",
    "verify-full",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Database: {message}")]
    InvalidDatabase { message: String },

    #[error("{field} must be a positive integer")]
    InvalidPositiveInteger { field: String },

    #[error("Invalid log format: {0}. Must be one of: pretty, json, compact")]
    InvalidLogFormat(String),

    #[error("Environment variable placeholder in '{field}' was not resolved: {value}")]
    UnresolvedEnvVar { field: String, value: String },
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_config(config: &DataInstrumentConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_database(&config.database, &mut report);
    validate_rolling(&config.rolling, &mut report);
    validate_logging(&config.logging, &mut report);

    report
}

fn validate_database(db: &DatabaseConfig, report: &mut ValidationReport) {
    if db.host.is_empty() {
        report.add_error(ValidationError::InvalidDatabase {
            message: "host is required".to_string(),
        });
    }

    if db.database.is_empty() {
        report.add_error(ValidationError::InvalidDatabase {
            message: "database name is required".to_string(),
        });
    }

    if db.port == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "database.port".to_string(),
        });
    }

    if db.max_connections == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "database.max_connections".to_string(),
        });
    }

    if db.connection_timeout_seconds == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "database.connection_timeout_seconds".to_string(),
        });
    }

    if !VALID_SSL_MODES.contains(&db.ssl_mode.as_str()) {
        report.add_error(ValidationError::InvalidDatabase {
            message: format!("unknown ssl_mode '{}'", db.ssl_mode),
        });
    }

    // Credentials may contain a literal `$`, so only `${VAR}` counts there
    let resolved_fields = [
        ("database.host", &db.host, false),
        ("database.database", &db.database, false),
        ("database.username", &db.username, true),
        ("database.password", &db.password, true),
    ];
    for (field, value, credential) in resolved_fields {
        let unresolved = if credential {
            has_unresolved_braced_env_vars(value)
        } else {
            has_unresolved_env_vars(value)
        };
        if unresolved {
            report.add_error(ValidationError::UnresolvedEnvVar {
                field: field.to_string(),
                value: value.clone(),
            });
        }
    }
}

fn validate_rolling(rolling: &RollingConfig, report: &mut ValidationReport) {
    if rolling.month_match == MonthMatch::Substring {
        report.add_warning(
            "rolling.month_match",
            "substring matching can accept a partial month token (e.g. 'F2' inside 'F23')",
        );
    }
}

fn validate_logging(logging: &LoggingConfig, report: &mut ValidationReport) {
    let format = logging.format.to_lowercase();
    if !VALID_LOG_FORMATS.contains(&format.as_str()) {
        report.add_error(ValidationError::InvalidLogFormat(logging.format.clone()));
    }

    if logging.service_name.is_empty() {
        report.add_warning("logging.service_name", "service name is empty");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> DataInstrumentConfig {
        DataInstrumentConfig {
            database: DatabaseConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "data".to_string(),
                username: "loader".to_string(),
                password: "secret".to_string(),
                ssl_mode: "prefer".to_string(),
                max_connections: 20,
                connection_timeout_seconds: 30,
            },
            rolling: RollingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        let report = validate_config(&valid_config());
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = valid_config();
        config.database.port = 0;
        config.database.max_connections = 0;

        let report = validate_config(&config);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.contains(&ValidationError::InvalidPositiveInteger {
            field: "database.max_connections".to_string(),
        }));
    }

    #[test]
    fn test_unresolved_placeholder_rejected() {
        let mut config = valid_config();
        config.database.password = "${DB_PASSWORD}".to_string();

        let report = validate_config(&config);
        assert!(!report.is_valid());
        assert!(matches!(
            &report.errors[0],
            ValidationError::UnresolvedEnvVar { field, .. } if field == "database.password"
        ));
    }

    #[test]
    fn test_literal_dollar_in_password_accepted() {
        let mut config = valid_config();
        config.database.password = "pa$word".to_string();
        config.database.username = "etl$svc".to_string();

        let report = validate_config(&config);
        assert!(report.is_valid(), "{:?}", report.errors);
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut config = valid_config();
        config.logging.format = "xml".to_string();

        let report = validate_config(&config);
        assert_eq!(
            report.errors,
            vec![ValidationError::InvalidLogFormat("xml".to_string())]
        );
    }

    #[test]
    fn test_substring_matching_warns() {
        let mut config = valid_config();
        config.rolling.month_match = MonthMatch::Substring;

        let report = validate_config(&config);
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].field, "rolling.month_match");
    }
}
