//! Mapper selection by hardware id or advertised interface.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::{BackendSet, MappingMode};
use crate::contract::{DeviceMapper, MapperContext};
use crate::inert::InertMapper;
use crate::instrument::{InstrumentMapper, MapperFamily};

/// Standard gamepad interface, also advertised by some guitars.
pub const GAMEPAD_INTERFACE: Uuid = Uuid::from_u128(0x082e402c_07df_45e1_a5ab_a3127af197b5);
pub const MADCATZ_GUITAR_INTERFACE: Uuid =
    Uuid::from_u128(0x0d2ae438_7f7d_4933_8693_30fc55018e77);

const HARDWARE_IDS: [((u16, u16), MapperFamily); 9] = [
    // Guitars
    ((0x0738, 0x4161), MapperFamily::Guitar),
    ((0x0E6F, 0x0170), MapperFamily::Guitar),
    (RIFFMASTER_IDS, MapperFamily::Guitar),
    // Drumkits
    ((0x0738, 0x4262), MapperFamily::Drums),
    ((0x0E6F, 0x0171), MapperFamily::Drums),
    // Other
    ((0x1430, 0x079B), MapperFamily::GhlGuitar),
    ((0x0738, 0x4164), MapperFamily::WirelessLegacy),
    // Gamepads
    ((0x045E, 0x02DD), MapperFamily::Gamepad),
    ((0x045E, 0x0B00), MapperFamily::Gamepad),
];

// Only interfaces confirmed from device captures. Other families are matched
// through their hardware ids.
const INTERFACES: [(Uuid, MapperFamily); 2] = [
    (MADCATZ_GUITAR_INTERFACE, MapperFamily::Guitar),
    (GAMEPAD_INTERFACE, MapperFamily::Gamepad),
];

/// Interfaces ignored when another recognised interface is also advertised.
const AMBIGUITY_EXEMPT: [Uuid; 1] = [GAMEPAD_INTERFACE];

const RIFFMASTER_IDS: (u16, u16) = (0x0E6F, 0x0248);

/// Family registered for a vendor/product pair.
pub fn family_for_hardware_ids(vendor_id: u16, product_id: u16) -> Option<MapperFamily> {
    HARDWARE_IDS
        .iter()
        .find(|(ids, _)| *ids == (vendor_id, product_id))
        .map(|(_, family)| *family)
}

/// Family registered for an advertised interface set.
///
/// `None` when no interface is recognised, or when more than one is after
/// dropping ambiguity-exempt interfaces.
pub fn family_for_interface_ids(interfaces: &[Uuid]) -> Option<MapperFamily> {
    match_interfaces(&INTERFACES, interfaces)
}

fn match_interfaces(table: &[(Uuid, MapperFamily)], interfaces: &[Uuid]) -> Option<MapperFamily> {
    let mut matches: Vec<(Uuid, MapperFamily)> = Vec::new();
    for guid in interfaces {
        if let Some(entry) = table.iter().find(|(id, _)| id == guid) {
            if !matches.contains(entry) {
                matches.push(*entry);
            }
        }
    }

    if matches.len() > 1 {
        matches.retain(|(id, _)| !AMBIGUITY_EXEMPT.contains(id));
    }

    match matches.as_slice() {
        [(_, family)] => Some(*family),
        _ => None,
    }
}

fn log_interfaces(interfaces: &[Uuid]) {
    for guid in interfaces {
        warn!(interface = %guid, "advertised interface");
    }
}

/// Global mapper settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    pub mode: MappingMode,
    /// Map standard gamepads. Meant for testing with hardware that is easier to
    /// come by than instruments.
    pub allow_gamepads: bool,
}

/// Creates mappers on the configured backend.
///
/// Clones share the backends, so device capacity is global.
#[derive(Debug, Clone)]
pub struct MapperFactory {
    backends: Arc<BackendSet>,
    config: MapperConfig,
}

impl MapperFactory {
    pub fn new(backends: BackendSet, config: MapperConfig) -> Self {
        Self {
            backends: Arc::new(backends),
            config,
        }
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    fn family_enabled(&self, family: MapperFamily) -> bool {
        family != MapperFamily::Gamepad || self.config.allow_gamepads
    }

    /// Mapper for a device identified only by vendor and product id.
    ///
    /// Unrecognised devices get an inert mapper.
    pub fn by_hardware_ids(&self, context: MapperContext) -> Option<Box<dyn DeviceMapper>> {
        match family_for_hardware_ids(context.vendor_id, context.product_id) {
            Some(family) => self.create(family, context),
            None => {
                debug!(
                    vendor_id = format_args!("{:04X}", context.vendor_id),
                    product_id = format_args!("{:04X}", context.product_id),
                    "hardware ids not recognised, device will not be mapped"
                );
                Some(Box::new(InertMapper::new(context)))
            }
        }
    }

    pub fn is_supported_by_hardware_ids(&self, vendor_id: u16, product_id: u16) -> bool {
        family_for_hardware_ids(vendor_id, product_id).is_some_and(|f| self.family_enabled(f))
    }

    /// Family for a device's advertised interfaces and hardware ids.
    ///
    /// Hardware ids fill in for an unrecognised interface set, and take
    /// precedence over the generic gamepad interface that instruments also
    /// advertise.
    fn family_for_device(
        &self,
        context: &MapperContext,
        interfaces: &[Uuid],
    ) -> Option<MapperFamily> {
        let by_hardware = family_for_hardware_ids(context.vendor_id, context.product_id);
        match family_for_interface_ids(interfaces) {
            Some(MapperFamily::Gamepad) if by_hardware.is_some() => by_hardware,
            Some(family) => Some(family),
            None => {
                if let Some(family) = by_hardware {
                    debug!(%family, "no unique supported interface, using hardware ids");
                }
                by_hardware
            }
        }
    }

    /// Mapper for a device's advertised interfaces.
    ///
    /// Devices recognised by neither interface nor hardware ids get an inert
    /// mapper.
    pub fn by_interface_ids(
        &self,
        context: MapperContext,
        interfaces: &[Uuid],
    ) -> Option<Box<dyn DeviceMapper>> {
        match self.family_for_device(&context, interfaces) {
            Some(family) => self.create(family, context),
            None => {
                warn!(
                    count = interfaces.len(),
                    "no unique supported interface, device will not be mapped"
                );
                log_interfaces(interfaces);
                Some(Box::new(InertMapper::new(context)))
            }
        }
    }

    /// Whether [`Self::by_interface_ids`] would produce a mapper, ignoring capacity.
    pub fn is_supported_by_interface_ids(
        &self,
        context: &MapperContext,
        interfaces: &[Uuid],
    ) -> bool {
        self.family_for_device(context, interfaces)
            .is_none_or(|f| self.family_enabled(f))
    }

    /// Mapper for a client that was never identified.
    pub fn fallback(&self, context: MapperContext) -> Option<Box<dyn DeviceMapper>> {
        self.create(MapperFamily::Fallback, context)
    }

    /// Create a mapper for `family` on the configured backend.
    ///
    /// `None` when the family is disabled or the backend is out of devices.
    pub fn create(
        &self,
        family: MapperFamily,
        context: MapperContext,
    ) -> Option<Box<dyn DeviceMapper>> {
        if !self.family_enabled(family) {
            warn!("gamepads are only mapped when allow_gamepads is set");
            return None;
        }

        let (family, mode) = self.resolve(family, &context);
        let backend = self.backends.for_mode(mode);
        if !backend.devices_available() {
            debug!(%family, %mode, "no virtual devices available");
            return None;
        }

        let controller = match backend.create() {
            Ok(controller) => controller,
            Err(err) => {
                error!(%family, %mode, error = %err, "failed to create mapper for device");
                return None;
            }
        };

        let mapper = InstrumentMapper::new(family, mode, controller, context);
        info!(mapper = mapper.name(), "created new mapper");
        if !backend.devices_available() {
            warn!(%mode, "device limit reached, no new devices will be handled");
        }
        Some(Box::new(mapper))
    }

    /// Apply identity and mode specific variants.
    fn resolve(&self, family: MapperFamily, context: &MapperContext) -> (MapperFamily, MappingMode) {
        let mode = self.config.mode;
        match family {
            MapperFamily::Guitar
                if mode == MappingMode::ViGEm
                    && (context.vendor_id, context.product_id) == RIFFMASTER_IDS =>
            {
                (MapperFamily::RiffmasterGuitar, mode)
            }
            // GHL guitars and gamepads have no RPCS3 specific layout
            MapperFamily::GhlGuitar | MapperFamily::Gamepad if mode == MappingMode::Rpcs3 => {
                (family, MappingMode::ViGEm)
            }
            // The adapter forwards gamepad reports regardless of mode
            MapperFamily::WirelessLegacy => (family, MappingMode::ViGEm),
            _ => (family, mode),
        }
    }
}
