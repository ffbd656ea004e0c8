//! Detection-to-delivery controller.
//!
//! A [`SensorGate`] turns raw sensor levels into cooldown-limited
//! [`DetectionEvent`](shared::domain::DetectionEvent)s, a
//! [`ConnectivitySupervisor`] advances the network link one transition per
//! tick, and a [`DeliveryAgent`] relays each accepted event to the remote
//! endpoint with a single bounded HTTP attempt. The [`Controller`] runs the
//! three once per tick and pushes status to a [`StatusPresenter`].

pub mod connectivity;
pub mod controller;
pub mod delivery;
pub mod platform;
pub mod sensor_gate;
pub mod status;
pub mod transport;

pub use connectivity::{ConnectivitySupervisor, ReconnectPolicy};
pub use controller::{Controller, ControllerStats, Disposition, TickReport};
pub use delivery::{DeliveryAgent, DETECT_PATH};
pub use platform::{
    HttpResponse, HttpTransport, LinkError, PostRequest, RadioLink, SensorInput, StatusPresenter,
    TransportError,
};
pub use sensor_gate::SensorGate;
pub use status::{DetectionSummary, StatusScreen, StatusSnapshot};
pub use transport::ReqwestTransport;
