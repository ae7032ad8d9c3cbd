pub mod request_limits;
pub mod unit_of_work;

pub use request_limits::RequestLimitService;
pub use unit_of_work::{AppUnitOfWork, AppUnitOfWorkBuilder};
