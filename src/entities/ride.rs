use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::Coordinates;
use crate::error::Error;

/// One rider-to-driver trip. `history` is append-only: every committed
/// transition pushes exactly one entry, and the last entry always matches
/// `status`. Rides are never deleted; `completed` and `cancelled` are
/// terminal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub status: Status,
    pub rider_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub pickup: Coordinates,
    pub destination: Coordinates,
    pub fare: f64,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Requested,
    Accepted,
    PickedUp,
    InTransit,
    Completed,
    Cancelled,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Accepted => "accepted",
            Self::PickedUp => "picked_up",
            Self::InTransit => "in_transit",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Result<Self, Error> {
        match value {
            "requested" => Ok(Self::Requested),
            "accepted" => Ok(Self::Accepted),
            "picked_up" => Ok(Self::PickedUp),
            "in_transit" => Ok(Self::InTransit),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(Error::InvalidStatus(other.into())),
        }
    }

    /// A ride in one of these states occupies its driver.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Accepted | Self::PickedUp | Self::InTransit)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub status: Status,
    pub timestamp: DateTime<Utc>,
}

impl Ride {
    pub fn new(
        rider_id: Uuid,
        pickup: Coordinates,
        destination: Coordinates,
        fare: f64,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            status: Status::Requested,
            rider_id,
            driver_id: None,
            pickup,
            destination,
            fare,
            history: vec![HistoryEntry {
                status: Status::Requested,
                timestamp: now,
            }],
            created_at: now,
        }
    }

    pub fn is_requested(&self) -> bool {
        self.status == Status::Requested
    }

    fn record(&mut self, status: Status) {
        self.status = status;
        self.history.push(HistoryEntry {
            status,
            timestamp: Utc::now(),
        });
    }

    /// Claim by an accepting driver. The caller commits the result with a
    /// conditional write on the ride still being `requested`, so a stale
    /// claim loses rather than overwrites.
    #[tracing::instrument]
    pub fn assign_driver(&mut self, driver_id: Uuid) -> Result<(), Error> {
        match self.status {
            Status::Requested => {
                self.driver_id = Some(driver_id);
                self.record(Status::Accepted);
                Ok(())
            }
            Status::Accepted | Status::PickedUp | Status::InTransit => {
                Err(Error::RideUnavailable)
            }
            Status::Completed | Status::Cancelled => Err(Error::InvalidTransition(format!(
                "cannot accept a ride with status {}",
                self.status.name()
            ))),
        }
    }

    /// Rider-side cancellation, legal only before the trip is underway.
    #[tracing::instrument]
    pub fn cancel(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Requested | Status::Accepted => {
                self.record(Status::Cancelled);
                Ok(())
            }
            _ => Err(Error::InvalidTransition(format!(
                "cannot cancel a ride with status {}",
                self.status.name()
            ))),
        }
    }

    /// Driver-side progression through the trip, including the driver's own
    /// cancellation of an underway ride.
    #[tracing::instrument]
    pub fn advance(&mut self, to: Status) -> Result<(), Error> {
        let legal = matches!(
            (self.status, to),
            (Status::Accepted, Status::PickedUp)
                | (Status::PickedUp, Status::InTransit)
                | (Status::InTransit, Status::Completed)
                | (
                    Status::Accepted | Status::PickedUp | Status::InTransit,
                    Status::Cancelled
                )
        );

        if !legal {
            return Err(Error::InvalidTransition(format!(
                "cannot move a ride from {} to {}",
                self.status.name(),
                to.name()
            )));
        }

        self.record(to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ride() -> Ride {
        let point = Coordinates {
            latitude: 23.8103,
            longitude: 90.4125,
        };
        Ride::new(Uuid::new_v4(), point, point, 15.0)
    }

    #[test]
    fn new_ride_starts_requested_with_one_history_entry() {
        let ride = ride();

        assert_eq!(ride.status, Status::Requested);
        assert!(ride.driver_id.is_none());
        assert_eq!(ride.history.len(), 1);
        assert_eq!(ride.history[0].status, Status::Requested);
    }

    #[test]
    fn every_transition_appends_exactly_one_entry() {
        let mut ride = ride();
        let driver = Uuid::new_v4();

        ride.assign_driver(driver).unwrap();
        ride.advance(Status::PickedUp).unwrap();
        ride.advance(Status::InTransit).unwrap();
        ride.advance(Status::Completed).unwrap();

        let statuses: Vec<Status> = ride.history.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![
                Status::Requested,
                Status::Accepted,
                Status::PickedUp,
                Status::InTransit,
                Status::Completed,
            ]
        );
        assert_eq!(ride.history.last().unwrap().status, ride.status);
        assert_eq!(ride.driver_id, Some(driver));
    }

    #[test]
    fn assign_on_claimed_ride_is_unavailable() {
        let mut ride = ride();
        ride.assign_driver(Uuid::new_v4()).unwrap();

        let result = ride.assign_driver(Uuid::new_v4());
        assert!(matches!(result, Err(Error::RideUnavailable)));
    }

    #[test]
    fn assign_on_terminal_ride_is_invalid() {
        let mut ride = ride();
        ride.cancel().unwrap();

        let result = ride.assign_driver(Uuid::new_v4());
        assert!(matches!(result, Err(Error::InvalidTransition(_))));
    }

    #[test]
    fn cancel_is_legal_only_before_pickup() {
        let mut requested = ride();
        assert!(requested.cancel().is_ok());

        let mut accepted = ride();
        accepted.assign_driver(Uuid::new_v4()).unwrap();
        assert!(accepted.cancel().is_ok());

        let mut picked_up = ride();
        picked_up.assign_driver(Uuid::new_v4()).unwrap();
        picked_up.advance(Status::PickedUp).unwrap();
        assert!(matches!(
            picked_up.cancel(),
            Err(Error::InvalidTransition(_))
        ));

        let mut completed = ride();
        completed.assign_driver(Uuid::new_v4()).unwrap();
        completed.advance(Status::PickedUp).unwrap();
        completed.advance(Status::InTransit).unwrap();
        completed.advance(Status::Completed).unwrap();
        assert!(matches!(
            completed.cancel(),
            Err(Error::InvalidTransition(_))
        ));

        let mut cancelled = ride();
        cancelled.cancel().unwrap();
        assert!(matches!(
            cancelled.cancel(),
            Err(Error::InvalidTransition(_))
        ));
    }

    #[test]
    fn advance_follows_the_trip_order() {
        let mut ride = ride();
        ride.assign_driver(Uuid::new_v4()).unwrap();

        assert!(matches!(
            ride.advance(Status::InTransit),
            Err(Error::InvalidTransition(_))
        ));
        assert!(matches!(
            ride.advance(Status::Completed),
            Err(Error::InvalidTransition(_))
        ));
        assert!(matches!(
            ride.advance(Status::Requested),
            Err(Error::InvalidTransition(_))
        ));

        ride.advance(Status::PickedUp).unwrap();
        assert!(matches!(
            ride.advance(Status::PickedUp),
            Err(Error::InvalidTransition(_))
        ));
    }

    #[test]
    fn driver_may_cancel_an_underway_ride() {
        let mut ride = ride();
        ride.assign_driver(Uuid::new_v4()).unwrap();
        ride.advance(Status::PickedUp).unwrap();
        ride.advance(Status::Cancelled).unwrap();

        assert_eq!(ride.status, Status::Cancelled);
        assert!(matches!(
            ride.advance(Status::InTransit),
            Err(Error::InvalidTransition(_))
        ));
    }

    #[test]
    fn unknown_status_strings_are_rejected() {
        assert!(matches!(
            Status::parse("teleported"),
            Err(Error::InvalidStatus(_))
        ));
        assert_eq!(Status::parse("picked_up").unwrap(), Status::PickedUp);
    }
}
