pub mod availability;
pub mod booking_detector;
pub mod scan_processor;
pub mod schedule;
pub mod scheduler;
pub mod watches;

pub use availability::AvailabilityChecker;
pub use booking_detector::{BookingDetector, BookingReport};
pub use scan_processor::{ScanOutcome, ScanProcessor, WatchProcessor};
pub use schedule::ScanCadence;
pub use scheduler::{Scheduler, TickReport};
pub use watches::{WatchPatch, WatchService};
