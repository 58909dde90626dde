//! Types shared by every crate in the storefront order service.

pub mod identity;
pub mod paging;
pub mod types;

pub use identity::{Requester, Role};
pub use paging::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Page, PageRequest, Pagination, SortDirection};
pub use types::{OrderId, UserId};
