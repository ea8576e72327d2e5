//! hublink Client
//!
//! Async device and module clients built on the hublink core. A client
//! drives a callback-based `Pipeline` through the callback bridge and hands
//! unsolicited inbound traffic to callers through per-key inboxes.
//!
//! ```ignore
//! let client = ClientBuilder::new(pipeline)
//!     .with_console_logging(LogLevel::Info)
//!     .build_device_client()?;
//! client.connect().await?;
//! let request = client.receive_method_request(Some("reboot")).await?;
//! client
//!     .send_method_response(MethodResponse::from_request(&request, 200, None))
//!     .await?;
//! ```

pub mod builder;
pub mod client;
pub mod device;
pub mod module;

pub use builder::ClientBuilder;
pub use client::{ClientCore, HubClient};
pub use device::DeviceClient;
pub use module::ModuleClient;
