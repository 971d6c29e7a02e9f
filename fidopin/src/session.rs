//! PIN-change session
//!
//! A session walks one authenticator through
//! `Idle -> DeviceSelected -> KeyAgreed -> PendingChange -> Done | Failed`.
//! Everything that needs a person (choosing a device, typing PINs, reading
//! warnings) goes through the [`Interaction`] trait, so the same flow runs
//! behind a terminal prompt or a test script.

use crate::client_pin::{self, build_change_pin, change_pin_status, KeyAgreement, PinProtocol};
use crate::config::SessionConfig;
use crate::credential::PinCredential;
use crate::error::{Error, ProtocolError, Result, SelectionError, SessionOutcome, ValidationError};

use fidopin_ctap::{AuthenticatorInfo, CtapCommand, CtapResponse, PinStatus};
use fidopin_transport::{DeviceDescriptor, DeviceEnumerator, Transport, TransportError};

use zeroize::Zeroizing;

/// Progress of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    DeviceSelected,
    KeyAgreed,
    PendingChange,
    Done,
    Failed,
    /// changePIN was sent but its result never arrived
    Unknown,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Done | SessionState::Failed | SessionState::Unknown
        )
    }
}

/// PINs as typed, before validation
pub struct PinEntry {
    pub current: Zeroizing<Vec<u8>>,
    pub new: Zeroizing<Vec<u8>>,
    pub confirm: Zeroizing<Vec<u8>>,
}

impl PinEntry {
    pub fn new(current: &[u8], new: &[u8], confirm: &[u8]) -> Self {
        Self {
            current: Zeroizing::new(current.to_vec()),
            new: Zeroizing::new(new.to_vec()),
            confirm: Zeroizing::new(confirm.to_vec()),
        }
    }
}

/// The person driving the session
pub trait Interaction {
    /// Connected devices were listed; not called when there are none
    fn devices_found(&mut self, _devices: &[DeviceDescriptor]) {}

    /// Raw text naming one of `devices` by 1-based index
    ///
    /// Only called when more than one device is connected. `None` means the
    /// input was closed.
    fn choose_device(&mut self, devices: &[DeviceDescriptor]) -> Option<String>;

    /// The device the session will use, however it was chosen
    fn device_selected(&mut self, _device: &DeviceDescriptor) {}

    /// Current PIN, new PIN and its confirmation; `None` if entry was aborted
    fn read_pins(&mut self, device: &DeviceDescriptor) -> Option<PinEntry>;

    /// Remaining PIN attempts, reported before the change is sent
    fn pin_retries(&mut self, _retries: u8) {}

    /// The changePIN request is about to be sent
    fn changing_pin(&mut self) {}
}

/// Parse a 1-based device index
///
/// Returns the 0-based position.
pub fn parse_selection(raw: &str, count: usize) -> std::result::Result<usize, SelectionError> {
    let trimmed = raw.trim();
    let index: usize = trimmed
        .parse()
        .map_err(|_| SelectionError::NotANumber(trimmed.to_string()))?;
    if index == 0 || index > count {
        return Err(SelectionError::OutOfRange { index, count });
    }
    Ok(index - 1)
}

/// Pick the device to use
///
/// No devices is an error without prompting, a single device is used
/// without prompting, and a preset index skips the prompt.
pub fn select_device<'a, I: Interaction + ?Sized>(
    devices: &'a [DeviceDescriptor],
    preset: Option<usize>,
    interaction: &mut I,
) -> std::result::Result<&'a DeviceDescriptor, SelectionError> {
    if devices.is_empty() {
        return Err(SelectionError::NoDevices);
    }

    if let Some(index) = preset {
        if index == 0 || index > devices.len() {
            return Err(SelectionError::OutOfRange {
                index,
                count: devices.len(),
            });
        }
        return Ok(&devices[index - 1]);
    }

    if let [only] = devices {
        return Ok(only);
    }

    let raw = interaction
        .choose_device(devices)
        .ok_or(SelectionError::NoInput)?;
    let position = parse_selection(&raw, devices.len())?;
    Ok(&devices[position])
}

/// Pick the PIN/UV auth protocol for a device
///
/// A configured preference wins when the device advertises it; otherwise
/// protocol 2 is preferred over 1.
pub fn choose_protocol(info: &AuthenticatorInfo, preference: Option<PinProtocol>) -> Result<PinProtocol> {
    match info.client_pin() {
        None => return Err(ProtocolError::PinNotSupported.into()),
        Some(false) => return Err(Error::Device(PinStatus::PinNotSet)),
        Some(true) => {}
    }

    if let Some(preferred) = preference {
        if info.supports_protocol(preferred.version()) {
            return Ok(preferred);
        }
        log::warn!("Device does not advertise {}, negotiating", preferred);
    }

    for candidate in [PinProtocol::V2, PinProtocol::V1] {
        if info.supports_protocol(candidate.version()) {
            return Ok(candidate);
        }
    }

    let offered = info
        .pin_uv_auth_protocols
        .as_ref()
        .and_then(|protocols| protocols.first().copied())
        .unwrap_or(0);
    Err(ProtocolError::UnsupportedProtocol(offered).into())
}

/// One PIN change on one opened device
pub struct Session<T> {
    transport: T,
    config: SessionConfig,
    state: SessionState,
}

impl<T: Transport> Session<T> {
    /// Start a session on an opened device
    pub fn new(transport: T, config: SessionConfig) -> Self {
        log::debug!("Session state: {:?}", SessionState::DeviceSelected);
        Self {
            transport,
            config,
            state: SessionState::DeviceSelected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Release the device handle
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn transition(&mut self, next: SessionState) {
        log::debug!("Session state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Change the PIN; a session runs at most once
    pub fn change_pin<I: Interaction + ?Sized>(
        &mut self,
        credential: &PinCredential,
        interaction: &mut I,
    ) -> SessionOutcome {
        if self.state != SessionState::DeviceSelected {
            return SessionOutcome::Failed(ProtocolError::SessionFinished.into());
        }

        let outcome = match self.prepare(credential, interaction) {
            Ok(payload) => self.send_change(&payload, interaction),
            Err(err) => SessionOutcome::Failed(err),
        };

        let terminal = match &outcome {
            SessionOutcome::Done => SessionState::Done,
            SessionOutcome::Failed(_) => SessionState::Failed,
            SessionOutcome::Unknown(_) => SessionState::Unknown,
        };
        self.transition(terminal);
        outcome
    }

    /// getInfo, key agreement and retry check; returns the changePIN payload
    fn prepare<I: Interaction + ?Sized>(
        &mut self,
        credential: &PinCredential,
        interaction: &mut I,
    ) -> Result<Vec<u8>> {
        let info = self.get_info()?;
        let protocol = choose_protocol(&info, self.config.protocol)?;
        log::info!("Using {}", protocol);

        if let Some(min) = info.min_pin_length {
            if credential.new_pin().len() < usize::from(min) {
                log::warn!(
                    "New PIN is shorter than the device minimum of {} bytes",
                    min
                );
            }
        }

        let key_agreement = KeyAgreement::establish(&mut self.transport, protocol)?;
        self.transition(SessionState::KeyAgreed);

        match client_pin::get_pin_retries(&mut self.transport, protocol) {
            Ok(retries) => {
                log::debug!("{} PIN retries remaining", retries);
                interaction.pin_retries(retries);
            }
            Err(err) => log::warn!("Could not read the PIN retry counter: {}", err),
        }

        build_change_pin(&key_agreement, credential.current(), credential.new_pin())
    }

    fn get_info(&mut self) -> Result<AuthenticatorInfo> {
        let raw = self
            .transport
            .send_cbor(CtapCommand::GetInfo.as_u8(), &[])?;
        let response = CtapResponse::parse(&raw)?;
        if !response.is_success() {
            return Err(Error::Device(response.pin_status()));
        }

        let info = AuthenticatorInfo::from_cbor(&response.data)?;
        log::debug!(
            "Authenticator versions {:?}, PIN protocols {:?}",
            info.versions,
            info.pin_uv_auth_protocols
        );
        if info.force_pin_change == Some(true) {
            log::info!("The authenticator requires a PIN change");
        }
        Ok(info)
    }

    fn send_change<I: Interaction + ?Sized>(&mut self, payload: &[u8], interaction: &mut I) -> SessionOutcome {
        self.transition(SessionState::PendingChange);
        interaction.changing_pin();

        let raw = match self
            .transport
            .send_cbor(CtapCommand::ClientPin.as_u8(), payload)
        {
            Ok(raw) => raw,
            // The device refused the frame outright; nothing was processed
            Err(err @ (TransportError::ChannelBusy | TransportError::Device(_))) => {
                return SessionOutcome::Failed(err.into());
            }
            Err(err) => return unknown(err),
        };

        match change_pin_status(&raw) {
            Ok(PinStatus::Success) => SessionOutcome::Done,
            Ok(status) => SessionOutcome::Failed(Error::Device(status)),
            Err(err) => unknown(err),
        }
    }
}

fn unknown(err: impl std::fmt::Display) -> SessionOutcome {
    log::warn!("changePIN result lost: {}", err);
    SessionOutcome::Unknown(format!(
        "Operation status unknown ({}). Verify the PIN manually.",
        err
    ))
}

/// Run a whole session: list, select, read PINs, validate, open, change
pub fn run<E, I>(enumerator: &mut E, config: SessionConfig, interaction: &mut I) -> SessionOutcome
where
    E: DeviceEnumerator + ?Sized,
    I: Interaction + ?Sized,
{
    log::debug!("Session state: {:?}", SessionState::Idle);

    let devices = match enumerator.list() {
        Ok(devices) => devices,
        Err(err) => return SessionOutcome::Failed(err.into()),
    };
    if !devices.is_empty() {
        interaction.devices_found(&devices);
    }
    let descriptor = match select_device(&devices, config.device, interaction) {
        Ok(descriptor) => descriptor.clone(),
        Err(err) => return SessionOutcome::Failed(err.into()),
    };
    log::info!("Using device: {}", descriptor);
    interaction.device_selected(&descriptor);

    let Some(entry) = interaction.read_pins(&descriptor) else {
        return SessionOutcome::Failed(ValidationError::NoInput.into());
    };
    let credential = match PinCredential::validate(entry.current, entry.new, entry.confirm) {
        Ok(credential) => credential,
        Err(err) => return SessionOutcome::Failed(err.into()),
    };

    let device = match enumerator.open(&descriptor) {
        Ok(device) => device,
        Err(err) => return SessionOutcome::Failed(err.into()),
    };

    Session::new(device, config).change_pin(&credential, interaction)
}
