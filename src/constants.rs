pub mod network {
    pub const TIMEOUT_API_REQUEST_MS: u64 = 30_000;
    pub const API_BASE_PATH: &str = "/api/assessorias";
    pub const OAUTH_TOKEN_PATH: &str = "/oauth/token";
    pub const USER_AGENT: &str = concat!("cobransaas-mcp/", env!("CARGO_PKG_VERSION"));
}

pub mod oauth {
    pub const GRANT_TYPE: &str = "client_credentials";
    pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3_600;
    pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";
    pub const SAFETY_MARGIN_SECS: u64 = 60;
}

pub mod retry {
    pub const MAX_RETRIES: u32 = 3;
    pub const BASE_DELAY_MS: u64 = 500;
    pub const MAX_DELAY_MS: u64 = 8_000;
    pub const JITTER: f64 = 0.1;
}

pub mod pagination {
    pub const MODE_PARAM: &str = "mode";
    pub const MODE_CONTINUABLE: &str = "CONTINUABLE";
    pub const CURSOR_PARAM: &str = "continuable";
    pub const SIZE_PARAM: &str = "size";
    pub const HEADER_HAS_NEXT: &str = "x-meta-has-next";
    pub const HEADER_CONTINUABLE: &str = "x-meta-continuable";
    pub const HEADER_CURRENT_SIZE: &str = "x-meta-current-size";
    pub const MAX_PAGES: u32 = 100;
    pub const PAGE_SIZE: u64 = 10;
    pub const LIST_LIMIT: u64 = 50;
    pub const LIST_LIMIT_MAX: u64 = 100;
}

pub mod rate_limit {
    pub const WINDOW_MS: u64 = 1_000;
    pub const MAX_REQUESTS: u32 = 10;
}

pub mod limits {
    pub const ERROR_BODY_PREVIEW_BYTES: usize = 2_048;
    pub const MAX_SCHEMA_ERRORS: usize = 10;
}
