pub mod job_fields;
pub mod keywords;
pub mod posting_url;

pub use job_fields::{JobFields, RemoteStatus, parse_date_posted, strip_code_fences};
pub use keywords::parse_keyword_array;
pub use posting_url::is_valid_posting_url;
