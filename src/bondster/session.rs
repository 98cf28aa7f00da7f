use chrono::{DateTime, Duration, Utc};

use super::device::random_device;

/// Values are treated as expired this long before their actual expiry.
const EXPIRY_SKEW_SECS: i64 = 10;

/// A credential value with its own expiry clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiring {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl Expiring {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at - Duration::seconds(EXPIRY_SKEW_SECS)
    }
}

/// Gateway session. The JWT can be prolonged; the ssid only comes from a
/// full login.
#[derive(Debug, Clone)]
pub struct Session {
    pub device: String,
    pub channel: String,
    pub jwt: Option<Expiring>,
    pub ssid: Option<Expiring>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Fresh unauthenticated session with a new device and channel.
    pub fn new() -> Self {
        Self {
            device: random_device(),
            channel: uuid::Uuid::new_v4().to_string(),
            jwt: None,
            ssid: None,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn is_jwt_expired(&self, now: DateTime<Utc>) -> bool {
        self.jwt.as_ref().map_or(true, |jwt| jwt.is_expired(now))
    }

    pub fn is_ssid_expired(&self, now: DateTime<Utc>) -> bool {
        self.ssid.as_ref().map_or(true, |ssid| ssid.is_expired(now))
    }

    /// Both values present and unexpired.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.is_jwt_expired(now) && !self.is_ssid_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn empty_session_is_expired() {
        let session = Session::new();
        assert!(session.is_jwt_expired(now()));
        assert!(session.is_ssid_expired(now()));
        assert!(!session.is_usable(now()));
    }

    #[test]
    fn expiry_applies_skew() {
        let mut session = Session::new();
        session.jwt = Some(Expiring::new("a", now() - Duration::seconds(11)));
        assert!(session.is_jwt_expired(now()));

        session.jwt = Some(Expiring::new("a", now() + Duration::seconds(11)));
        assert!(!session.is_jwt_expired(now()));

        session.jwt = Some(Expiring::new("a", now() + Duration::seconds(9)));
        assert!(session.is_jwt_expired(now()));
    }

    #[test]
    fn clocks_are_independent() {
        let mut session = Session::new();
        session.jwt = Some(Expiring::new("jwt", now() - Duration::minutes(1)));
        session.ssid = Some(Expiring::new("ssid", now() + Duration::hours(1)));
        assert!(session.is_jwt_expired(now()));
        assert!(!session.is_ssid_expired(now()));
        assert!(!session.is_usable(now()));
    }

    #[test]
    fn clear_regenerates_identity() {
        let mut session = Session::new();
        session.jwt = Some(Expiring::new("jwt", now() + Duration::hours(1)));
        let channel = session.channel.clone();
        session.clear();
        assert!(session.jwt.is_none());
        assert_ne!(session.channel, channel);
    }
}
