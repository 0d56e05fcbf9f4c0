//! Streaming device enumeration.
//!
//! Each call to [`crate::devices`] starts a producer thread that walks the
//! native device list and sends a [`DeviceInfo`] per device through a bounded
//! channel. The producer holds [`ENUMERATE_LOCK`] from the moment it touches
//! the native API until the native list is released.

use std::{
    iter::FusedIterator,
    ops::ControlFlow,
    sync::{
        mpsc::{self, Receiver},
        Arc, Mutex, PoisonError,
    },
    thread,
};

use log::{debug, error};

use crate::{platform::Backend, DeviceInfo, Error, ErrorKind};

/// Serializes every sequence of native enumeration calls in the process.
///
/// macOS releases previously enumerated devices when a second
/// `IOHIDManagerSetDeviceMatching` call starts before the first enumeration
/// finished, so the whole open-list, iterate, release-list sequence runs under
/// this lock, as does resolving a path when opening a device there. Not
/// reentrant: never take it while it is already held by the current thread.
pub(crate) static ENUMERATE_LOCK: Mutex<()> = Mutex::new(());

/// Number of records the producer may run ahead of the consumer.
const CHANNEL_CAPACITY: usize = 16;

type Message = Result<DeviceInfo, Error>;

/// Iterator over the devices found by one enumeration pass.
///
/// Returned by [`crate::devices`]. The iterator is one-shot: once it returns
/// `None` it is finished, and a new call to [`crate::devices`] is needed to
/// enumerate again.
///
/// Dropping it before the end is fine; the enumeration thread notices, stops
/// walking the device list and releases the native resources.
pub struct Devices {
    rx: Option<Receiver<Message>>,
    error: Option<Error>,
}

impl Devices {
    /// A stream that is already finished, for platforms without a backend.
    pub(crate) fn finished() -> Devices {
        Devices {
            rx: None,
            error: None,
        }
    }

    pub(crate) fn start(backend: Arc<dyn Backend>) -> Devices {
        let (tx, rx) = mpsc::sync_channel::<Message>(CHANNEL_CAPACITY);

        let spawned = thread::Builder::new()
            .name("nhid-enumerate".into())
            .spawn(move || {
                let _guard = ENUMERATE_LOCK
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);

                let mut sent = 0usize;
                let res = backend.enumerate(&mut |info| match tx.send(Ok(info)) {
                    Ok(()) => {
                        sent += 1;
                        ControlFlow::Continue(())
                    }
                    Err(_) => {
                        debug!("Enumeration abandoned after {sent} devices");
                        ControlFlow::Break(())
                    }
                });

                match res {
                    Ok(()) => debug!("Enumeration finished, {sent} devices"),
                    Err(e) => {
                        // consumer may be gone already
                        let _ = tx.send(Err(e.log_error()));
                    }
                }
            });

        match spawned {
            Ok(_) => Devices {
                rx: Some(rx),
                error: None,
            },
            Err(e) => {
                error!("Failed to spawn enumeration thread: {e}");
                Devices {
                    rx: None,
                    error: Some(Error::new(
                        ErrorKind::NoResources,
                        "hid: failed to start enumeration thread",
                    )),
                }
            }
        }
    }

    /// Take the error that ended this enumeration early, if any.
    ///
    /// An enumeration that fails to obtain the native device list yields no
    /// devices; this distinguishes that case from a system without devices.
    pub fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }
}

impl Iterator for Devices {
    type Item = DeviceInfo;

    fn next(&mut self) -> Option<DeviceInfo> {
        let rx = self.rx.as_ref()?;
        match rx.recv() {
            Ok(Ok(info)) => Some(info),
            Ok(Err(e)) => {
                self.error = Some(e);
                self.rx = None;
                None
            }
            Err(_) => {
                self.rx = None;
                None
            }
        }
    }
}

impl FusedIterator for Devices {}

impl std::fmt::Debug for Devices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Devices")
            .field("finished", &self.rx.is_none())
            .field("error", &self.error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, thread, time::Duration};

    use super::Devices;
    use crate::{platform::mock::MockBackend, ErrorKind};

    #[test]
    fn test_yields_in_native_order() {
        let backend = Arc::new(MockBackend::with_devices(5));
        let paths: Vec<String> = Devices::start(backend.clone())
            .map(|d| d.path().to_owned())
            .collect();
        let expected: Vec<String> = backend
            .devices()
            .iter()
            .map(|d| d.path().to_owned())
            .collect();
        assert_eq!(paths, expected);
    }

    #[test]
    fn test_paths_unique() {
        let backend = Arc::new(MockBackend::with_devices(40));
        let paths: Vec<String> = Devices::start(backend)
            .map(|d| d.path().to_owned())
            .collect();
        let unique: HashSet<&String> = paths.iter().collect();
        assert_eq!(unique.len(), paths.len());
        assert_eq!(paths.len(), 40);
    }

    #[test]
    fn test_empty_list_closes_stream() {
        let backend = Arc::new(MockBackend::with_devices(0));
        let mut devices = Devices::start(backend);
        assert!(devices.next().is_none());
        assert!(devices.next().is_none());
        assert!(devices.take_error().is_none());
    }

    #[test]
    fn test_native_failure_is_reported() {
        let backend = Arc::new(MockBackend::with_devices(3).fail_enumeration());
        let mut devices = Devices::start(backend);
        assert!(devices.next().is_none());
        assert_eq!(devices.take_error().unwrap().kind(), ErrorKind::NoResources);
    }

    #[test]
    fn test_abandoned_stream_releases_resources() {
        // more devices than the channel holds, so the producer blocks on send
        let backend = Arc::new(MockBackend::with_devices(100));
        let mut devices = Devices::start(backend.clone());
        assert!(devices.next().is_some());
        drop(devices);

        for _ in 0..200 {
            if backend.lists_released() == 1 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(backend.lists_released(), 1);

        // the enumeration lock was released too
        assert_eq!(Devices::start(backend.clone()).count(), 100);
    }

    #[test]
    fn test_concurrent_enumerations() {
        let backend = Arc::new(MockBackend::with_devices(20).slow_enumeration());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let backend = backend.clone();
                thread::spawn(move || Devices::start(backend).count())
            })
            .collect();

        for t in threads {
            assert_eq!(t.join().unwrap(), 20);
        }
        assert!(!backend.saw_overlap());
        assert_eq!(backend.lists_released(), 8);
    }

    #[test]
    fn test_finished() {
        let mut devices = Devices::finished();
        assert!(devices.next().is_none());
        assert!(devices.take_error().is_none());
    }
}
