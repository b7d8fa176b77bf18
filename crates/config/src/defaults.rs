pub fn default_postgres_port() -> u16 {
    5432
}

pub fn default_ssl_mode() -> String {
    "require".to_string()
}

pub fn default_max_connections() -> u32 {
    20
}

pub fn default_connection_timeout() -> u64 {
    30
}

pub fn default_service_name() -> String {
    "data-instrument".to_string()
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}
