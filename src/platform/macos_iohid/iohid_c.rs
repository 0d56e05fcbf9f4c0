//! `IOHIDManager` and `IOHIDDevice` FFI, missing from io-kit-sys.
#![allow(non_camel_case_types, non_snake_case, dead_code, non_upper_case_globals)]

use std::ffi::c_void;

use core_foundation_sys::{
    base::{CFAllocatorRef, CFIndex, CFTypeRef},
    dictionary::CFDictionaryRef,
    runloop::CFRunLoopRef,
    set::CFSetRef,
    string::CFStringRef,
};
use io_kit_sys::ret::IOReturn;

pub(crate) type IOOptionBits = u32;

#[repr(C)]
pub(crate) struct __IOHIDManager {
    _private: [u8; 0],
}
pub(crate) type IOHIDManagerRef = *mut __IOHIDManager;

#[repr(C)]
pub(crate) struct __IOHIDDevice {
    _private: [u8; 0],
}
pub(crate) type IOHIDDeviceRef = *mut __IOHIDDevice;

pub(crate) type IOHIDReportType = u32;
pub(crate) const kIOHIDReportTypeInput: IOHIDReportType = 0;
pub(crate) const kIOHIDReportTypeOutput: IOHIDReportType = 1;
pub(crate) const kIOHIDReportTypeFeature: IOHIDReportType = 2;

pub(crate) const kIOHIDOptionsTypeNone: IOOptionBits = 0x00;
pub(crate) const kIOHIDOptionsTypeSeizeDevice: IOOptionBits = 0x01;

pub(crate) type IOHIDCallback =
    unsafe extern "C" fn(context: *mut c_void, result: IOReturn, sender: *mut c_void);

#[link(name = "IOKit", kind = "framework")]
extern "C" {
    pub(crate) fn IOHIDManagerCreate(
        allocator: CFAllocatorRef,
        options: IOOptionBits,
    ) -> IOHIDManagerRef;
    pub(crate) fn IOHIDManagerSetDeviceMatching(
        manager: IOHIDManagerRef,
        matching: CFDictionaryRef,
    );
    pub(crate) fn IOHIDManagerOpen(manager: IOHIDManagerRef, options: IOOptionBits) -> IOReturn;
    pub(crate) fn IOHIDManagerClose(manager: IOHIDManagerRef, options: IOOptionBits) -> IOReturn;
    pub(crate) fn IOHIDManagerCopyDevices(manager: IOHIDManagerRef) -> CFSetRef;

    pub(crate) fn IOHIDDeviceGetProperty(device: IOHIDDeviceRef, key: CFStringRef) -> CFTypeRef;
    pub(crate) fn IOHIDDeviceOpen(device: IOHIDDeviceRef, options: IOOptionBits) -> IOReturn;
    pub(crate) fn IOHIDDeviceClose(device: IOHIDDeviceRef, options: IOOptionBits) -> IOReturn;
    pub(crate) fn IOHIDDeviceSetReport(
        device: IOHIDDeviceRef,
        reportType: IOHIDReportType,
        reportID: CFIndex,
        report: *const u8,
        reportLength: CFIndex,
    ) -> IOReturn;
    pub(crate) fn IOHIDDeviceGetReport(
        device: IOHIDDeviceRef,
        reportType: IOHIDReportType,
        reportID: CFIndex,
        report: *mut u8,
        pReportLength: *mut CFIndex,
    ) -> IOReturn;
    pub(crate) fn IOHIDDeviceRegisterRemovalCallback(
        device: IOHIDDeviceRef,
        callback: Option<IOHIDCallback>,
        context: *mut c_void,
    );
    pub(crate) fn IOHIDDeviceScheduleWithRunLoop(
        device: IOHIDDeviceRef,
        runLoop: CFRunLoopRef,
        runLoopMode: CFStringRef,
    );
    pub(crate) fn IOHIDDeviceUnscheduleFromRunLoop(
        device: IOHIDDeviceRef,
        runLoop: CFRunLoopRef,
        runLoopMode: CFStringRef,
    );
}
