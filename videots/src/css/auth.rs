//! Host side of the drive authentication handshake.
//!
//! ## Sequence
//!
//! 1. Request an authentication grant ID (AGID) from the drive.
//! 2. Send the host challenge, read back key1 and find the variant under
//!    which [`derive_key`] reproduces it.
//! 3. Read the drive challenge and answer with key2.
//! 4. Derive the bus key from key1 and key2.
//! 5. Read the disc key block and strip the bus key from it.
//!
//! Any failing drive command invalidates the grant and restarts from step 1,
//! at most three times. A drive whose key1 matches no variant is rejected
//! outright.

use std::io;

use anyhow::Result;
use log::{debug, info, warn};

use super::crypt::{KeyType, VARIANT_COUNT, derive_key};
use super::{CHALLENGE_SIZE, Css, DiscKey, KEY_SIZE, Key};
use crate::utils::errors::AuthError;

/// Attempts at obtaining a grant before giving up.
pub const AGID_ATTEMPTS: usize = 3;

/// Drive commands the handshake depends on.
///
/// Buffers are in the order the drive sends and expects them; the
/// handshake reverses byte order where the protocol requires.
pub trait Drive {
    /// Returns true when the disc in `layer` carries copyright protection.
    fn read_copyright(&mut self, layer: u8) -> io::Result<bool>;

    fn report_agid(&mut self) -> io::Result<u8>;

    fn invalidate_agid(&mut self, agid: u8) -> io::Result<()>;

    fn send_challenge(&mut self, agid: u8, challenge: &[u8; CHALLENGE_SIZE]) -> io::Result<()>;

    fn report_key1(&mut self, agid: u8) -> io::Result<Key>;

    fn report_challenge(&mut self, agid: u8) -> io::Result<[u8; CHALLENGE_SIZE]>;

    fn send_key2(&mut self, agid: u8, key: &Key) -> io::Result<()>;

    fn read_disc_key(&mut self, agid: u8, buf: &mut DiscKey) -> io::Result<()>;
}

/// Progress of the handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    AgidAcquired,
    ChallengeExchanged,
    DriveVariantConfirmed,
    SessionKeyEstablished,
    DiscKeyDecrypted,
    Authenticated,
}

/// Keys exchanged with the drive during one handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscAuthState {
    pub challenge: [u8; CHALLENGE_SIZE],
    pub key1: Key,
    pub key2: Key,
    /// Bus key once the handshake completes.
    pub key_check: Key,
    pub variant: u8,
}

enum Failure {
    Retry(AuthError),
    Fatal(AuthError),
}

fn step(name: &'static str) -> impl FnOnce(io::Error) -> Failure {
    move |source| Failure::Retry(AuthError::Step { step: name, source })
}

impl Css {
    /// Returns true when the disc is CSS protected.
    pub fn is_scrambled<D: Drive + ?Sized>(drive: &mut D) -> Result<bool> {
        let copyright = drive.read_copyright(0).map_err(|source| AuthError::Step {
            step: "ReadCopyright",
            source,
        })?;
        debug!("copyright flag: {copyright}");
        Ok(copyright)
    }

    /// Runs the full handshake and decrypts the disc key.
    ///
    /// On failure the session is left [`AuthState::Unauthenticated`].
    pub fn authenticate<D: Drive + ?Sized>(&mut self, drive: &mut D) -> Result<()> {
        let mut last_error = None;

        for attempt in 1..=AGID_ATTEMPTS {
            self.reset_auth();
            debug!("requesting AGID, attempt {attempt}");

            let agid = match drive.report_agid() {
                Ok(agid) => agid,
                Err(source) => {
                    warn!("ReportAgid failed, invalidating: {source}");
                    if let Err(e) = drive.invalidate_agid(0) {
                        debug!("InvalidateAgid failed: {e}");
                    }
                    last_error = Some(AuthError::AgidExhausted {
                        attempts: attempt,
                        source,
                    });
                    continue;
                }
            };

            self.agid = Some(agid);
            self.transition(AuthState::AgidAcquired);

            match self.exchange(drive, agid) {
                Ok(()) => {
                    self.transition(AuthState::Authenticated);
                    info!("drive authenticated, variant {}", self.disc.variant);
                    return Ok(());
                }
                Err(failure) => {
                    if let Err(e) = drive.invalidate_agid(agid) {
                        debug!("InvalidateAgid failed: {e}");
                    }
                    self.reset_auth();

                    match failure {
                        Failure::Fatal(err) => return Err(err.into()),
                        Failure::Retry(err) => {
                            warn!("{err}, restarting authentication");
                            last_error = Some(err);
                        }
                    }
                }
            }
        }

        Err(last_error.unwrap_or(AuthError::NotAuthenticated).into())
    }

    fn exchange<D: Drive + ?Sized>(&mut self, drive: &mut D, agid: u8) -> Result<(), Failure> {
        self.disc.challenge = std::array::from_fn(|i| i as u8);

        let wire: [u8; CHALLENGE_SIZE] = std::array::from_fn(|i| self.disc.challenge[9 - i]);
        drive
            .send_challenge(agid, &wire)
            .map_err(step("SendChallenge"))?;

        let wire = drive.report_key1(agid).map_err(step("ReportKey1"))?;
        self.disc.key1 = std::array::from_fn(|i| wire[4 - i]);
        self.transition(AuthState::ChallengeExchanged);

        let variant = (0..VARIANT_COUNT)
            .find(|&v| derive_key(KeyType::Key1, v, &self.disc.challenge) == self.disc.key1)
            .ok_or(Failure::Fatal(AuthError::NoMatchingVariant {
                key1: self.disc.key1,
            }))?;
        self.disc.variant = variant;
        debug!("drive authentic, using variant {variant}");
        self.transition(AuthState::DriveVariantConfirmed);

        let wire = drive
            .report_challenge(agid)
            .map_err(step("ReportChallenge"))?;
        self.disc.challenge = std::array::from_fn(|i| wire[9 - i]);

        self.disc.key2 = derive_key(KeyType::Key2, variant, &self.disc.challenge);
        let wire: Key = std::array::from_fn(|i| self.disc.key2[4 - i]);
        drive.send_key2(agid, &wire).map_err(step("SendKey2"))?;

        self.disc.challenge[..KEY_SIZE].copy_from_slice(&self.disc.key1);
        self.disc.challenge[KEY_SIZE..].copy_from_slice(&self.disc.key2);
        self.disc.key_check = derive_key(KeyType::BusKey, variant, &self.disc.challenge);
        self.transition(AuthState::SessionKeyEstablished);

        drive
            .read_disc_key(agid, &mut self.disc_key)
            .map_err(step("ReadDiscKey"))?;
        for (i, byte) in self.disc_key.iter_mut().enumerate() {
            *byte ^= self.disc.key_check[4 - (i % KEY_SIZE)];
        }
        self.transition(AuthState::DiscKeyDecrypted);

        Ok(())
    }

    fn reset_auth(&mut self) {
        self.disc = DiscAuthState::default();
        self.disc_key.fill(0);
        self.agid = None;
        self.state = AuthState::Unauthenticated;
    }

    fn transition(&mut self, next: AuthState) {
        debug!("authentication: {:?} -> {next:?}", self.state);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drive that computes its side of the handshake with a fixed variant.
    struct MockDrive {
        variant: u8,
        agid: u8,
        agid_failures: usize,
        agid_requests: usize,
        invalidated: Vec<u8>,
        fail_key2_once: bool,
        bogus_key1: bool,
        host_challenge: [u8; CHALLENGE_SIZE],
        drive_challenge: [u8; CHALLENGE_SIZE],
        key1: Key,
        key2: Option<Key>,
        disc_key: DiscKey,
    }

    impl MockDrive {
        fn new(variant: u8) -> Self {
            Self {
                variant,
                agid: 1,
                agid_failures: 0,
                agid_requests: 0,
                invalidated: Vec::new(),
                fail_key2_once: false,
                bogus_key1: false,
                host_challenge: [0; CHALLENGE_SIZE],
                drive_challenge: [0x3A, 0x11, 0xC4, 0x07, 0x9E, 0x52, 0x6B, 0xF0, 0x28, 0xD9],
                key1: [0; KEY_SIZE],
                key2: None,
                disc_key: std::array::from_fn(|i| (i * 7 % 256) as u8),
            }
        }

        fn bus_key(&self) -> Key {
            let mut challenge = [0u8; CHALLENGE_SIZE];
            challenge[..KEY_SIZE].copy_from_slice(&self.key1);
            challenge[KEY_SIZE..].copy_from_slice(&self.key2.unwrap_or_default());
            derive_key(KeyType::BusKey, self.variant, &challenge)
        }
    }

    fn unavailable() -> io::Error {
        io::Error::other("unit not ready")
    }

    impl Drive for MockDrive {
        fn read_copyright(&mut self, _layer: u8) -> io::Result<bool> {
            Ok(true)
        }

        fn report_agid(&mut self) -> io::Result<u8> {
            self.agid_requests += 1;
            if self.agid_requests <= self.agid_failures {
                return Err(unavailable());
            }
            Ok(self.agid)
        }

        fn invalidate_agid(&mut self, agid: u8) -> io::Result<()> {
            self.invalidated.push(agid);
            Ok(())
        }

        fn send_challenge(&mut self, _agid: u8, wire: &[u8; CHALLENGE_SIZE]) -> io::Result<()> {
            self.host_challenge = std::array::from_fn(|i| wire[9 - i]);
            Ok(())
        }

        fn report_key1(&mut self, _agid: u8) -> io::Result<Key> {
            self.key1 = if self.bogus_key1 {
                [0xDE, 0xAD, 0xBE, 0xEF, 0x00]
            } else {
                derive_key(KeyType::Key1, self.variant, &self.host_challenge)
            };
            Ok(std::array::from_fn(|i| self.key1[4 - i]))
        }

        fn report_challenge(&mut self, _agid: u8) -> io::Result<[u8; CHALLENGE_SIZE]> {
            Ok(std::array::from_fn(|i| self.drive_challenge[9 - i]))
        }

        fn send_key2(&mut self, _agid: u8, wire: &Key) -> io::Result<()> {
            if self.fail_key2_once {
                self.fail_key2_once = false;
                return Err(unavailable());
            }
            self.key2 = Some(std::array::from_fn(|i| wire[4 - i]));
            Ok(())
        }

        fn read_disc_key(&mut self, _agid: u8, buf: &mut DiscKey) -> io::Result<()> {
            let bus_key = self.bus_key();
            for (i, byte) in buf.iter_mut().enumerate() {
                *byte = self.disc_key[i] ^ bus_key[4 - (i % KEY_SIZE)];
            }
            Ok(())
        }
    }

    #[test]
    fn full_handshake() -> Result<()> {
        let mut drive = MockDrive::new(5);
        let mut css = Css::default();

        css.authenticate(&mut drive)?;

        assert_eq!(css.state, AuthState::Authenticated);
        assert_eq!(css.disc.variant, 5);
        assert_eq!(css.agid, Some(1));
        assert_eq!(drive.host_challenge, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(
            drive.key2,
            Some(derive_key(KeyType::Key2, 5, &drive.drive_challenge))
        );
        assert_eq!(css.disc.key_check, drive.bus_key());
        assert_eq!(css.disc_key[..], drive.disc_key[..]);
        assert_eq!(drive.agid_requests, 1);

        Ok(())
    }

    #[test]
    fn agid_retry() -> Result<()> {
        let mut drive = MockDrive::new(17);
        drive.agid_failures = 2;
        let mut css = Css::default();

        css.authenticate(&mut drive)?;

        assert_eq!(css.state, AuthState::Authenticated);
        assert_eq!(css.disc.variant, 17);
        assert_eq!(drive.agid_requests, 3);
        assert_eq!(drive.invalidated, [0, 0]);

        Ok(())
    }

    #[test]
    fn agid_exhausted() {
        let mut drive = MockDrive::new(0);
        drive.agid_failures = 3;
        let mut css = Css::default();

        let err = css.authenticate(&mut drive).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<AuthError>(),
            Some(AuthError::AgidExhausted { attempts: 3, .. })
        ));
        assert_eq!(css.state, AuthState::Unauthenticated);
        assert_eq!(drive.agid_requests, 3);
    }

    #[test]
    fn step_failure_restarts_from_agid() -> Result<()> {
        let mut drive = MockDrive::new(9);
        drive.fail_key2_once = true;
        let mut css = Css::default();

        css.authenticate(&mut drive)?;

        assert_eq!(css.state, AuthState::Authenticated);
        assert_eq!(drive.agid_requests, 2);
        assert_eq!(drive.invalidated, [1]);

        Ok(())
    }

    #[test]
    fn unknown_variant_is_fatal() {
        let mut drive = MockDrive::new(0);
        drive.bogus_key1 = true;
        let mut css = Css::default();

        let err = css.authenticate(&mut drive).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<AuthError>(),
            Some(AuthError::NoMatchingVariant { .. })
        ));
        assert_eq!(drive.agid_requests, 1);
        assert_eq!(css.state, AuthState::Unauthenticated);
    }

    #[test]
    fn copyright_check() -> Result<()> {
        assert!(Css::is_scrambled(&mut MockDrive::new(0))?);
        Ok(())
    }
}
