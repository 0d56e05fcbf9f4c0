use std::{
    sync::{mpsc, Mutex, PoisonError},
    thread,
};

use core_foundation::{base::TCFType, runloop::CFRunLoop};
use core_foundation_sys::runloop::kCFRunLoopDefaultMode;
use log::{error, info};

use super::{
    iohid::HidDevice,
    iohid_c::{IOHIDDeviceRef, IOHIDDeviceScheduleWithRunLoop, IOHIDDeviceUnscheduleFromRunLoop},
};

struct SendDeviceRef(IOHIDDeviceRef);
unsafe impl Send for SendDeviceRef {}
unsafe impl Sync for SendDeviceRef {}

struct EventLoop {
    runloop: Option<CFRunLoop>,
    count: usize,
}

static EVENT_LOOP: Mutex<EventLoop> = Mutex::new(EventLoop {
    runloop: None,
    count: 0,
});

/// Schedule `device` on the shared run loop thread so its removal callback
/// fires, starting the thread if this is the first device.
///
/// The device must outlive the returned registration.
pub(crate) fn schedule_device(device: &HidDevice) -> Option<EventRegistration> {
    let mut event_loop = EVENT_LOOP.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(runloop) = event_loop.runloop.as_ref() {
        device.schedule(runloop.as_concrete_TypeRef());
        event_loop.count += 1;
    } else {
        let (tx, rx) = mpsc::channel();
        let dev = SendDeviceRef(device.get());
        info!("starting event loop thread");
        let spawned = thread::Builder::new()
            .name("nhid-events".into())
            .spawn(move || {
                let runloop = CFRunLoop::get_current();
                let dev = dev;
                unsafe {
                    IOHIDDeviceScheduleWithRunLoop(
                        dev.0,
                        runloop.as_concrete_TypeRef(),
                        kCFRunLoopDefaultMode,
                    )
                };
                if tx.send(runloop).is_err() {
                    return;
                }
                CFRunLoop::run_current();
                info!("event loop thread exited");
            });
        if let Err(e) = spawned {
            error!("failed to start event loop thread: {e}");
            return None;
        }
        let Ok(runloop) = rx.recv() else {
            error!("event loop thread exited before starting");
            return None;
        };
        event_loop.runloop = Some(runloop);
        event_loop.count = 1;
    }
    Some(EventRegistration(SendDeviceRef(device.get())))
}

pub(crate) struct EventRegistration(SendDeviceRef);

impl Drop for EventRegistration {
    fn drop(&mut self) {
        let mut event_loop = EVENT_LOOP.lock().unwrap_or_else(PoisonError::into_inner);
        event_loop.count = event_loop.count.saturating_sub(1);

        let Some(runloop) = event_loop.runloop.as_ref() else {
            return;
        };
        unsafe {
            IOHIDDeviceUnscheduleFromRunLoop(
                self.0 .0,
                runloop.as_concrete_TypeRef(),
                kCFRunLoopDefaultMode,
            )
        };

        if event_loop.count == 0 {
            runloop.stop();
            event_loop.runloop.take();
        }
    }
}
