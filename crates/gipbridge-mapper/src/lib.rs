//! Instrument mappers for the GIP instrument bridge.
//!
//! A mapper turns one client's input reports into virtual controller reports.
//! [`MapperFactory`] picks the mapper for a client, either by vendor/product id
//! or by the interfaces its descriptor advertises, and creates it on the
//! backend for the configured [`MappingMode`]:
//!
//! ```
//! use gipbridge_mapper::{BackendSet, MapperConfig, MapperContext, MapperFactory};
//!
//! let (backends, xbox, _) = BackendSet::in_memory(4);
//! let factory = MapperFactory::new(backends, MapperConfig::default());
//!
//! let mapper = factory
//!     .by_hardware_ids(MapperContext::new(0x0738, 0x4161, false))
//!     .unwrap();
//! assert_eq!(mapper.name(), "guitar/vigem");
//! assert_eq!(xbox.active().len(), 1);
//! ```

pub mod backend;
pub mod contract;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod inert;
pub mod input;
pub mod instrument;

pub use backend::{BackendSet, ControllerBackend, InMemoryBackend, MappingMode, SubmittedReport};
pub use contract::{DeviceMapper, MapperContext};
pub use controller::{
    ControllerReport, Feedback, JoystickReport, VirtualController, XboxButtons, XboxReport,
};
pub use dispatch::{
    family_for_hardware_ids, family_for_interface_ids, MapperConfig, MapperFactory,
    GAMEPAD_INTERFACE,
};
pub use error::{MapperError, Result};
pub use inert::InertMapper;
pub use instrument::{InstrumentMapper, MapperFamily};
