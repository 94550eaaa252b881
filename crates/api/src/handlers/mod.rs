pub mod assets;
pub mod associations;
pub mod clients;
pub mod locks;

use serde::Deserialize;

/// Paging parameters shared by list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
