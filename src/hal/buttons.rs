//! Button GPIO interrupts.
//!
//! Both buttons are active-low with the internal pull-up. Every edge runs
//! [`on_button_edge`] in ISR context, which samples the pin level and the
//! microsecond clock and hands them to the [`ButtonLatch`].

use core::ffi::c_void;
use std::sync::Arc;

use esp_idf_svc::hal::gpio::{AnyIOPin, Input, InterruptType, PinDriver, Pull};
use esp_idf_svc::sys::{self, esp, EspError, ESP_ERR_INVALID_STATE};

use crate::input::{Button, ButtonLatch};

pub const SELECT_PIN: i32 = 25;
pub const SCROLL_PIN: i32 = 26;

struct EdgeContext {
    latch: Arc<ButtonLatch>,
    button: Button,
    pin: i32,
}

/// Configured button pins with their ISR handlers installed.
///
/// Dropping it removes the handlers.
pub struct ButtonInputs {
    _pins: [PinDriver<'static, AnyIOPin, Input>; 2],
    contexts: [(i32, *mut EdgeContext); 2],
}

// The raw contexts are only touched by the ISR (shared read) and by Drop
// after the handler is removed.
unsafe impl Send for ButtonInputs {}

impl ButtonInputs {
    pub fn new(
        select: AnyIOPin,
        scroll: AnyIOPin,
        latch: Arc<ButtonLatch>,
    ) -> Result<Self, EspError> {
        let select_pin = configure(select)?;
        let scroll_pin = configure(scroll)?;

        // Another driver may already have installed the service.
        match unsafe { esp!(sys::gpio_install_isr_service(0)) } {
            Ok(()) => {}
            Err(e) if e.code() == ESP_ERR_INVALID_STATE as i32 => {}
            Err(e) => return Err(e),
        }

        let select_ctx = register(SELECT_PIN, Button::Select, Arc::clone(&latch))?;
        let scroll_ctx = match register(SCROLL_PIN, Button::Scroll, latch) {
            Ok(ctx) => ctx,
            Err(e) => {
                unregister(SELECT_PIN, select_ctx);
                return Err(e);
            }
        };

        Ok(Self {
            _pins: [select_pin, scroll_pin],
            contexts: [(SELECT_PIN, select_ctx), (SCROLL_PIN, scroll_ctx)],
        })
    }
}

impl Drop for ButtonInputs {
    fn drop(&mut self) {
        for (pin, ctx) in self.contexts {
            unregister(pin, ctx);
        }
    }
}

fn configure(pin: AnyIOPin) -> Result<PinDriver<'static, AnyIOPin, Input>, EspError> {
    let mut driver = PinDriver::input(pin)?;
    driver.set_pull(Pull::Up)?;
    driver.set_interrupt_type(InterruptType::AnyEdge)?;
    Ok(driver)
}

fn register(
    pin: i32,
    button: Button,
    latch: Arc<ButtonLatch>,
) -> Result<*mut EdgeContext, EspError> {
    let ctx = Box::into_raw(Box::new(EdgeContext { latch, button, pin }));
    let added = unsafe {
        esp!(sys::gpio_isr_handler_add(pin, Some(on_button_edge), ctx.cast()))
            .and_then(|()| esp!(sys::gpio_intr_enable(pin)))
    };
    if let Err(e) = added {
        unregister(pin, ctx);
        return Err(e);
    }
    Ok(ctx)
}

fn unregister(pin: i32, ctx: *mut EdgeContext) {
    unsafe {
        sys::gpio_intr_disable(pin);
        sys::gpio_isr_handler_remove(pin);
        drop(Box::from_raw(ctx));
    }
}

/// GPIO ISR. Bounded: two register reads and one short critical section.
unsafe extern "C" fn on_button_edge(arg: *mut c_void) {
    let ctx = &*(arg as *const EdgeContext);
    let pressed = sys::gpio_get_level(ctx.pin) == 0;
    let now_us = sys::esp_timer_get_time() as u64;
    ctx.latch.on_edge(ctx.button, pressed, now_us);
}
