//! CTAP2 status codes and PIN error classification
//!
//! Every CTAP2 response starts with a one-byte status. [`StatusCode`] names
//! the registered codes; [`PinStatus`] folds them into the outcomes a PIN
//! change can have.
//!
//! Spec: <https://fidoalliance.org/specs/fido-v2.1-ps-20210615/fido-client-to-authenticator-protocol-v2.1-ps-20210615.html#error-responses>

use std::fmt;

/// CTAP2 status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatusCode {
    Success = 0x00,
    InvalidCommand = 0x01,
    InvalidParameter = 0x02,
    InvalidLength = 0x03,
    InvalidSeq = 0x04,
    Timeout = 0x05,
    ChannelBusy = 0x06,
    LockRequired = 0x0A,
    InvalidChannel = 0x0B,
    CborUnexpectedType = 0x11,
    InvalidCbor = 0x12,
    MissingParameter = 0x14,
    LimitExceeded = 0x15,
    FpDatabaseFull = 0x17,
    LargeBlobStorageFull = 0x18,
    CredentialExcluded = 0x19,
    Processing = 0x21,
    InvalidCredential = 0x22,
    UserActionPending = 0x23,
    OperationPending = 0x24,
    NoOperations = 0x25,
    UnsupportedAlgorithm = 0x26,
    OperationDenied = 0x27,
    KeyStoreFull = 0x28,
    UnsupportedOption = 0x2B,
    InvalidOption = 0x2C,
    KeepaliveCancel = 0x2D,
    NoCredentials = 0x2E,
    UserActionTimeout = 0x2F,
    NotAllowed = 0x30,
    PinInvalid = 0x31,
    PinBlocked = 0x32,
    PinAuthInvalid = 0x33,
    PinAuthBlocked = 0x34,
    PinNotSet = 0x35,
    PuatRequired = 0x36,
    PinPolicyViolation = 0x37,
    RequestTooLarge = 0x39,
    ActionTimeout = 0x3A,
    UpRequired = 0x3B,
    UvBlocked = 0x3C,
    IntegrityFailure = 0x3D,
    InvalidSubcommand = 0x3E,
    UvInvalid = 0x3F,
    UnauthorizedPermission = 0x40,
    Other = 0x7F,
}

impl StatusCode {
    /// Get the status code as a byte value
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Look up a registered status code
    ///
    /// Returns `None` for unassigned, extension and vendor codes.
    pub fn from_u8(value: u8) -> Option<Self> {
        use StatusCode::*;
        let code = match value {
            0x00 => Success,
            0x01 => InvalidCommand,
            0x02 => InvalidParameter,
            0x03 => InvalidLength,
            0x04 => InvalidSeq,
            0x05 => Timeout,
            0x06 => ChannelBusy,
            0x0A => LockRequired,
            0x0B => InvalidChannel,
            0x11 => CborUnexpectedType,
            0x12 => InvalidCbor,
            0x14 => MissingParameter,
            0x15 => LimitExceeded,
            0x17 => FpDatabaseFull,
            0x18 => LargeBlobStorageFull,
            0x19 => CredentialExcluded,
            0x21 => Processing,
            0x22 => InvalidCredential,
            0x23 => UserActionPending,
            0x24 => OperationPending,
            0x25 => NoOperations,
            0x26 => UnsupportedAlgorithm,
            0x27 => OperationDenied,
            0x28 => KeyStoreFull,
            0x2B => UnsupportedOption,
            0x2C => InvalidOption,
            0x2D => KeepaliveCancel,
            0x2E => NoCredentials,
            0x2F => UserActionTimeout,
            0x30 => NotAllowed,
            0x31 => PinInvalid,
            0x32 => PinBlocked,
            0x33 => PinAuthInvalid,
            0x34 => PinAuthBlocked,
            0x35 => PinNotSet,
            0x36 => PuatRequired,
            0x37 => PinPolicyViolation,
            0x39 => RequestTooLarge,
            0x3A => ActionTimeout,
            0x3B => UpRequired,
            0x3C => UvBlocked,
            0x3D => IntegrityFailure,
            0x3E => InvalidSubcommand,
            0x3F => UvInvalid,
            0x40 => UnauthorizedPermission,
            0x7F => Other,
            _ => return None,
        };
        Some(code)
    }

    /// The registry name, e.g. `CTAP2_ERR_PIN_INVALID`
    pub fn name(self) -> &'static str {
        use StatusCode::*;
        match self {
            Success => "CTAP2_OK",
            InvalidCommand => "CTAP1_ERR_INVALID_COMMAND",
            InvalidParameter => "CTAP1_ERR_INVALID_PARAMETER",
            InvalidLength => "CTAP1_ERR_INVALID_LENGTH",
            InvalidSeq => "CTAP1_ERR_INVALID_SEQ",
            Timeout => "CTAP1_ERR_TIMEOUT",
            ChannelBusy => "CTAP1_ERR_CHANNEL_BUSY",
            LockRequired => "CTAP1_ERR_LOCK_REQUIRED",
            InvalidChannel => "CTAP1_ERR_INVALID_CHANNEL",
            CborUnexpectedType => "CTAP2_ERR_CBOR_UNEXPECTED_TYPE",
            InvalidCbor => "CTAP2_ERR_INVALID_CBOR",
            MissingParameter => "CTAP2_ERR_MISSING_PARAMETER",
            LimitExceeded => "CTAP2_ERR_LIMIT_EXCEEDED",
            FpDatabaseFull => "CTAP2_ERR_FP_DATABASE_FULL",
            LargeBlobStorageFull => "CTAP2_ERR_LARGE_BLOB_STORAGE_FULL",
            CredentialExcluded => "CTAP2_ERR_CREDENTIAL_EXCLUDED",
            Processing => "CTAP2_ERR_PROCESSING",
            InvalidCredential => "CTAP2_ERR_INVALID_CREDENTIAL",
            UserActionPending => "CTAP2_ERR_USER_ACTION_PENDING",
            OperationPending => "CTAP2_ERR_OPERATION_PENDING",
            NoOperations => "CTAP2_ERR_NO_OPERATIONS",
            UnsupportedAlgorithm => "CTAP2_ERR_UNSUPPORTED_ALGORITHM",
            OperationDenied => "CTAP2_ERR_OPERATION_DENIED",
            KeyStoreFull => "CTAP2_ERR_KEY_STORE_FULL",
            UnsupportedOption => "CTAP2_ERR_UNSUPPORTED_OPTION",
            InvalidOption => "CTAP2_ERR_INVALID_OPTION",
            KeepaliveCancel => "CTAP2_ERR_KEEPALIVE_CANCEL",
            NoCredentials => "CTAP2_ERR_NO_CREDENTIALS",
            UserActionTimeout => "CTAP2_ERR_USER_ACTION_TIMEOUT",
            NotAllowed => "CTAP2_ERR_NOT_ALLOWED",
            PinInvalid => "CTAP2_ERR_PIN_INVALID",
            PinBlocked => "CTAP2_ERR_PIN_BLOCKED",
            PinAuthInvalid => "CTAP2_ERR_PIN_AUTH_INVALID",
            PinAuthBlocked => "CTAP2_ERR_PIN_AUTH_BLOCKED",
            PinNotSet => "CTAP2_ERR_PIN_NOT_SET",
            PuatRequired => "CTAP2_ERR_PUAT_REQUIRED",
            PinPolicyViolation => "CTAP2_ERR_PIN_POLICY_VIOLATION",
            RequestTooLarge => "CTAP2_ERR_REQUEST_TOO_LARGE",
            ActionTimeout => "CTAP2_ERR_ACTION_TIMEOUT",
            UpRequired => "CTAP2_ERR_UP_REQUIRED",
            UvBlocked => "CTAP2_ERR_UV_BLOCKED",
            IntegrityFailure => "CTAP2_ERR_INTEGRITY_FAILURE",
            InvalidSubcommand => "CTAP2_ERR_INVALID_SUBCOMMAND",
            UvInvalid => "CTAP2_ERR_UV_INVALID",
            UnauthorizedPermission => "CTAP2_ERR_UNAUTHORIZED_PERMISSION",
            Other => "CTAP1_ERR_OTHER",
        }
    }
}

impl From<StatusCode> for u8 {
    fn from(code: StatusCode) -> Self {
        code.as_u8()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02x})", self.name(), self.as_u8())
    }
}

/// Outcome of a PIN operation as reported by the authenticator
///
/// This is a closed classification of the status byte. Codes without a
/// PIN-specific meaning land in [`PinStatus::Other`] with the raw byte kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinStatus {
    /// CTAP2_OK
    Success,
    /// The current PIN is wrong; the retry counter was decremented
    PinInvalid,
    /// The retry counter reached zero; only a reset recovers the device
    PinBlocked,
    /// pinUvAuthParam did not verify against the shared secret
    PinAuthInvalid,
    /// Too many consecutive failures; power-cycle the device
    PinAuthBlocked,
    /// No PIN is configured on the device
    PinNotSet,
    /// The new PIN does not satisfy the device PIN policy
    PinPolicyViolation,
    /// Any other status byte
    Other(u8),
}

impl PinStatus {
    /// Whether the device reported success
    pub fn is_success(self) -> bool {
        self == PinStatus::Success
    }

    /// The raw status byte this classification came from
    pub fn code(self) -> u8 {
        match self {
            PinStatus::Success => StatusCode::Success.as_u8(),
            PinStatus::PinInvalid => StatusCode::PinInvalid.as_u8(),
            PinStatus::PinBlocked => StatusCode::PinBlocked.as_u8(),
            PinStatus::PinAuthInvalid => StatusCode::PinAuthInvalid.as_u8(),
            PinStatus::PinAuthBlocked => StatusCode::PinAuthBlocked.as_u8(),
            PinStatus::PinNotSet => StatusCode::PinNotSet.as_u8(),
            PinStatus::PinPolicyViolation => StatusCode::PinPolicyViolation.as_u8(),
            PinStatus::Other(code) => code,
        }
    }
}

impl From<u8> for PinStatus {
    fn from(code: u8) -> Self {
        match StatusCode::from_u8(code) {
            Some(StatusCode::Success) => PinStatus::Success,
            Some(StatusCode::PinInvalid) => PinStatus::PinInvalid,
            Some(StatusCode::PinBlocked) => PinStatus::PinBlocked,
            Some(StatusCode::PinAuthInvalid) => PinStatus::PinAuthInvalid,
            Some(StatusCode::PinAuthBlocked) => PinStatus::PinAuthBlocked,
            Some(StatusCode::PinNotSet) => PinStatus::PinNotSet,
            Some(StatusCode::PinPolicyViolation) => PinStatus::PinPolicyViolation,
            _ => PinStatus::Other(code),
        }
    }
}

impl fmt::Display for PinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinStatus::Success => write!(f, "success"),
            PinStatus::PinInvalid => write!(f, "the current PIN is incorrect"),
            PinStatus::PinBlocked => write!(f, "the PIN is blocked, the device must be reset"),
            PinStatus::PinAuthInvalid => write!(f, "PIN authentication failed"),
            PinStatus::PinAuthBlocked => {
                write!(f, "PIN authentication is blocked, power-cycle the device")
            }
            PinStatus::PinNotSet => write!(f, "no PIN is set on the device"),
            PinStatus::PinPolicyViolation => {
                write!(f, "the new PIN does not meet the device policy")
            }
            PinStatus::Other(code) => match StatusCode::from_u8(*code) {
                Some(known) => write!(f, "authenticator error {}", known),
                None => write!(f, "authenticator error 0x{:02x}", code),
            },
        }
    }
}
