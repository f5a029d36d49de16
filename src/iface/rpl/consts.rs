use crate::time::Duration;

/// The instance a root starts by default.
pub(crate) const RPL_DEFAULT_INSTANCE: u8 = 0x1e;

// ------------------------------------
// Constants used for the trickle timer:
// ------------------------------------
/// The DIO interval (n) represents 2^n ms. This is 3 in the standard, but
/// far too low when radios duty cycle; 2^12 ms = 4.096 s here.
pub(crate) const DEFAULT_DIO_INTERVAL_MIN: u8 = 12;
/// This is 20 in the standard, which would be unsuitable when starting
/// from a minimum interval of 2^12.
pub(crate) const DEFAULT_DIO_INTERVAL_DOUBLINGS: u8 = 8;
pub(crate) const DEFAULT_DIO_REDUNDANCY_CONSTANT: u8 = 10;

// ------------------------------------
// Constants used for rank computation:
// ------------------------------------
pub(crate) const DEFAULT_MIN_HOP_RANK_INCREASE: u16 = 256;

// ------------------------------------
// Constants used for downward routes:
// ------------------------------------
/// Granularity of RPL lifetime values, in seconds.
pub(crate) const DEFAULT_LIFETIME_UNIT: u16 = 60;
/// Route lifetime as a multiple of the lifetime unit.
pub(crate) const DEFAULT_LIFETIME: u8 = 30;
/// The lifetime announced in a No-Path DAO.
pub(crate) const ZERO_LIFETIME: u8 = 0;
/// Remaining lifetime given to a route after a No-Path DAO for it.
pub(crate) const NO_PATH_EXPIRATION: Duration = Duration::from_secs(60);

pub(crate) const DEFAULT_DODAG_PREFERENCE: u8 = 0;

/// The delay window a scheduled DAO is drawn from.
pub(crate) const DEFAULT_DAO_LATENCY: Duration = Duration::from_secs(4);
/// The first DAO-ACK expiration window.
pub(crate) const DAO_ACK_INITIAL_LATENCY: Duration = Duration::from_secs(6);
/// Total DAO transmissions before giving up on an acknowledgement.
pub(crate) const DAO_ACK_MAX_TRIES: u8 = 3;

/// Metric attributed to a link when its ETX is still unknown, in ETX
/// divisor units.
pub(crate) const INIT_LINK_METRIC: u16 = 5;

// ------------------------------------
// Constants used for DIS transmission:
// ------------------------------------
pub(crate) const DIS_START_DELAY: Duration = Duration::from_secs(5);
pub(crate) const DIS_INTERVAL: Duration = Duration::from_secs(60);
