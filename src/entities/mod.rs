mod account;
mod driver;
mod location;
mod ride;

pub use account::Account;
pub use driver::{Approval, Availability, Driver};
pub use location::Coordinates;
pub use ride::{HistoryEntry, Ride, Status};
