//! In-process authenticator for end-to-end tests
//!
//! Implements the authenticator side of getInfo and the ClientPIN
//! sub-commands getPinRetries, getKeyAgreement and changePIN, using the same
//! key agreement code as the client.

#![allow(dead_code)]

use fidopin::client_pin::pin_hash;
use fidopin::{
    DeviceDescriptor, DeviceEnumerator, Interaction, KeyAgreement, PinEntry, PinProtocol,
    Transport, TransportError,
};
use fidopin_crypto::KeyPair;
use fidopin_ctap::commands::client_pin::SubCommand;
use fidopin_ctap::{
    AuthenticatorInfo, ClientPinRequest, ClientPinResponse, CoseKey, CtapCommand, StatusCode,
};

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use rand::{rngs::OsRng, RngCore};

pub const MAX_RETRIES: u8 = 8;

/// Consecutive wrong PINs before a power cycle is required
pub const MAX_CONSECUTIVE_FAILURES: u8 = 3;

pub struct VirtualAuthenticator {
    pin_hash: Option<[u8; 16]>,
    retries: u8,
    consecutive_failures: u8,
    key_secret: [u8; 32],
    pub client_pin_supported: bool,
    pub protocols: Option<Vec<u8>>,
    pub min_pin_length: u8,
    /// PINs the device policy refuses regardless of length
    pub forbidden_pins: Vec<Vec<u8>>,
    /// Apply changePIN, then drop the response
    pub lose_change_response: bool,
    /// Every command byte received
    pub commands: Vec<u8>,
    /// Every ClientPIN sub-command received
    pub sub_commands: Vec<SubCommand>,
}

fn fresh_secret() -> [u8; 32] {
    loop {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        if KeyPair::from_secret_bytes(&secret).is_ok() {
            return secret;
        }
    }
}

fn status(code: StatusCode) -> Vec<u8> {
    vec![code.as_u8()]
}

impl VirtualAuthenticator {
    pub fn with_pin(pin: &str) -> Self {
        let mut authenticator = Self::without_pin();
        authenticator.pin_hash = Some(*pin_hash(pin.as_bytes()));
        authenticator
    }

    pub fn without_pin() -> Self {
        Self {
            pin_hash: None,
            retries: MAX_RETRIES,
            consecutive_failures: 0,
            key_secret: fresh_secret(),
            client_pin_supported: true,
            protocols: Some(vec![2, 1]),
            min_pin_length: 4,
            forbidden_pins: Vec::new(),
            lose_change_response: false,
            commands: Vec::new(),
            sub_commands: Vec::new(),
        }
    }

    pub fn retries(&self) -> u8 {
        self.retries
    }

    pub fn pin_matches(&self, pin: &str) -> bool {
        self.pin_hash == Some(*pin_hash(pin.as_bytes()))
    }

    pub fn power_cycle(&mut self) {
        self.consecutive_failures = 0;
        self.key_secret = fresh_secret();
    }

    fn key_pair(&self) -> KeyPair {
        match KeyPair::from_secret_bytes(&self.key_secret) {
            Ok(pair) => pair,
            Err(_) => unreachable!("secret was checked when generated"),
        }
    }

    fn get_info(&self) -> Vec<u8> {
        let mut options = BTreeMap::new();
        options.insert("rk".to_string(), true);
        if self.client_pin_supported {
            options.insert("clientPin".to_string(), self.pin_hash.is_some());
        }
        let info = AuthenticatorInfo {
            versions: vec!["FIDO_2_0".into(), "FIDO_2_1".into()],
            aaguid: vec![0x42; 16],
            options,
            pin_uv_auth_protocols: self.protocols.clone(),
            min_pin_length: Some(self.min_pin_length),
            ..Default::default()
        };

        let mut out = status(StatusCode::Success);
        out.extend(info.to_cbor().unwrap());
        out
    }

    fn client_pin(&mut self, payload: &[u8]) -> Vec<u8> {
        let Ok(request) = ClientPinRequest::from_cbor(payload) else {
            return status(StatusCode::InvalidCbor);
        };
        self.sub_commands.push(request.sub_command);

        let protocol = match request.protocol.map(PinProtocol::try_from) {
            Some(Ok(protocol)) => protocol,
            Some(Err(_)) => return status(StatusCode::InvalidParameter),
            None => return status(StatusCode::MissingParameter),
        };
        let advertised = self
            .protocols
            .as_ref()
            .map_or(protocol == PinProtocol::V1, |p| p.contains(&protocol.version()));
        if !advertised {
            return status(StatusCode::InvalidParameter);
        }

        let body = match request.sub_command {
            SubCommand::GetPinRetries => ClientPinResponse {
                pin_retries: Some(self.retries),
                power_cycle_state: Some(false),
                ..Default::default()
            },
            SubCommand::GetKeyAgreement => ClientPinResponse {
                key_agreement: Some(CoseKey::from_public_key(self.key_pair().public_key())),
                ..Default::default()
            },
            SubCommand::ChangePin => return self.change_pin(protocol, request),
            _ => return status(StatusCode::InvalidSubcommand),
        };

        let mut out = status(StatusCode::Success);
        out.extend(body.to_cbor().unwrap());
        out
    }

    fn change_pin(&mut self, protocol: PinProtocol, request: ClientPinRequest) -> Vec<u8> {
        let (Some(key), Some(param), Some(new_pin_enc), Some(pin_hash_enc)) = (
            request.key_agreement,
            request.pin_uv_auth_param,
            request.new_pin_enc,
            request.pin_hash_enc,
        ) else {
            return status(StatusCode::MissingParameter);
        };

        let Some(stored) = self.pin_hash else {
            return status(StatusCode::PinNotSet);
        };
        if self.retries == 0 {
            return status(StatusCode::PinBlocked);
        }
        if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
            return status(StatusCode::PinAuthBlocked);
        }

        let Ok(peer) = key.to_public_key() else {
            return status(StatusCode::InvalidParameter);
        };
        let Ok(shared) = KeyAgreement::from_parts(protocol, self.key_pair(), peer) else {
            return status(StatusCode::InvalidParameter);
        };

        let mut message = new_pin_enc.clone();
        message.extend_from_slice(&pin_hash_enc);
        if !shared.verify(&message, &param) {
            return status(StatusCode::PinAuthInvalid);
        }

        self.retries -= 1;
        let hash_ok = shared
            .decrypt(&pin_hash_enc)
            .map(|hash| hash[..] == stored[..])
            .unwrap_or(false);
        if !hash_ok {
            self.key_secret = fresh_secret();
            self.consecutive_failures += 1;
            if self.retries == 0 {
                return status(StatusCode::PinBlocked);
            }
            if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                return status(StatusCode::PinAuthBlocked);
            }
            return status(StatusCode::PinInvalid);
        }
        self.retries = MAX_RETRIES;
        self.consecutive_failures = 0;

        let Ok(padded) = shared.decrypt(&new_pin_enc) else {
            return status(StatusCode::InvalidParameter);
        };
        if padded.len() != 64 {
            return status(StatusCode::InvalidParameter);
        }
        let len = padded.iter().position(|&b| b == 0).unwrap_or(padded.len());
        let new_pin = &padded[..len];
        if new_pin.len() < usize::from(self.min_pin_length)
            || self.forbidden_pins.iter().any(|p| p.as_slice() == new_pin)
        {
            return status(StatusCode::PinPolicyViolation);
        }

        self.pin_hash = Some(*pin_hash(new_pin));
        status(StatusCode::Success)
    }
}

impl Transport for VirtualAuthenticator {
    fn send_cbor(&mut self, command: u8, payload: &[u8]) -> fidopin_transport::Result<Vec<u8>> {
        self.commands.push(command);
        let response = match CtapCommand::from_u8(command) {
            Some(CtapCommand::GetInfo) => self.get_info(),
            Some(CtapCommand::ClientPin) => {
                let response = self.client_pin(payload);
                if self.lose_change_response
                    && self.sub_commands.last() == Some(&SubCommand::ChangePin)
                {
                    return Err(TransportError::Timeout);
                }
                response
            }
            None => status(StatusCode::InvalidCommand),
        };
        Ok(response)
    }
}

/// Shared handle so a test can inspect the device after a session owned it
#[derive(Clone)]
pub struct SharedAuthenticator(pub Rc<RefCell<VirtualAuthenticator>>);

impl Transport for SharedAuthenticator {
    fn send_cbor(&mut self, command: u8, payload: &[u8]) -> fidopin_transport::Result<Vec<u8>> {
        self.0.borrow_mut().send_cbor(command, payload)
    }
}

/// Lists a fixed set of virtual devices
pub struct VirtualEnumerator {
    pub devices: Vec<(DeviceDescriptor, SharedAuthenticator)>,
    pub opened: Vec<String>,
}

impl VirtualEnumerator {
    pub fn new(authenticators: Vec<VirtualAuthenticator>) -> Self {
        let devices = authenticators
            .into_iter()
            .enumerate()
            .map(|(i, authenticator)| {
                let mut descriptor = DeviceDescriptor::new(format!("virtual:{}", i));
                descriptor.manufacturer = Some("Virtual".into());
                descriptor.product = Some(format!("Authenticator {}", i + 1));
                (
                    descriptor,
                    SharedAuthenticator(Rc::new(RefCell::new(authenticator))),
                )
            })
            .collect();
        Self {
            devices,
            opened: Vec::new(),
        }
    }

    pub fn device(&self, index: usize) -> std::cell::Ref<'_, VirtualAuthenticator> {
        self.devices[index].1 .0.borrow()
    }
}

impl DeviceEnumerator for VirtualEnumerator {
    type Device = SharedAuthenticator;

    fn list(&mut self) -> fidopin_transport::Result<Vec<DeviceDescriptor>> {
        Ok(self.devices.iter().map(|(d, _)| d.clone()).collect())
    }

    fn open(&mut self, descriptor: &DeviceDescriptor) -> fidopin_transport::Result<SharedAuthenticator> {
        self.opened.push(descriptor.id.clone());
        self.devices
            .iter()
            .find(|(d, _)| d == descriptor)
            .map(|(_, device)| device.clone())
            .ok_or_else(|| TransportError::NotFound(descriptor.id.clone()))
    }
}

/// Answers prompts from fixed values
pub struct ScriptedUser {
    pub choice: Option<String>,
    pub current: String,
    pub new: String,
    pub confirm: String,
    pub device_prompts: usize,
    pub devices_found: Vec<usize>,
    pub selected: Vec<String>,
    pub reported_retries: Vec<u8>,
}

impl ScriptedUser {
    pub fn changing(current: &str, new: &str) -> Self {
        Self {
            choice: None,
            current: current.into(),
            new: new.into(),
            confirm: new.into(),
            device_prompts: 0,
            devices_found: Vec::new(),
            selected: Vec::new(),
            reported_retries: Vec::new(),
        }
    }
}

impl Interaction for ScriptedUser {
    fn devices_found(&mut self, devices: &[DeviceDescriptor]) {
        self.devices_found.push(devices.len());
    }

    fn device_selected(&mut self, device: &DeviceDescriptor) {
        self.selected.push(device.id.clone());
    }

    fn choose_device(&mut self, _devices: &[DeviceDescriptor]) -> Option<String> {
        self.device_prompts += 1;
        self.choice.clone()
    }

    fn read_pins(&mut self, _device: &DeviceDescriptor) -> Option<PinEntry> {
        Some(PinEntry::new(
            self.current.as_bytes(),
            self.new.as_bytes(),
            self.confirm.as_bytes(),
        ))
    }

    fn pin_retries(&mut self, retries: u8) {
        self.reported_retries.push(retries);
    }
}
