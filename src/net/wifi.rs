//! CYW43439 WiFi radio.
//!
//! The radio's `Control` handle lives in [`wifi_task`]. The scheduler talks
//! to it through [`CywLink`]: requests go out over a signal, the link status
//! comes back through a critical-section cell. No call on the link ever
//! waits for the radio.

use core::cell::RefCell;

use crate::connectivity::{LinkStatus, WifiLink};
use cyw43::{Control, JoinOptions};
use cyw43_pio::{PioSpi, DEFAULT_CLOCK_DIVIDER};
use defmt::{info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_net::{Config, Stack, StackResources};
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{DMA_CH0, PIN_23, PIN_24, PIN_25, PIN_29, PIO0};
use embassy_rp::pio::{InterruptHandler, Pio};
use embassy_rp::{bind_interrupts, Peri};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use heapless::String;
use static_cell::StaticCell;

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => InterruptHandler<PIO0>;
});

/// Longest SSID the radio accepts.
const SSID_MAX: usize = 32;
/// Longest WPA2 passphrase.
const PSK_MAX: usize = 64;

/// Request from the scheduler to the radio task.
enum Request {
    Join {
        ssid: String<SSID_MAX>,
        psk: String<PSK_MAX>,
    },
    Leave,
}

static REQUEST: Signal<CriticalSectionRawMutex, Request> = Signal::new();
static STATUS: Mutex<CriticalSectionRawMutex, RefCell<LinkStatus>> =
    Mutex::new(RefCell::new(LinkStatus::Idle));

fn set_status(status: LinkStatus) {
    STATUS.lock(|s| *s.borrow_mut() = status);
}

fn status() -> LinkStatus {
    STATUS.lock(|s| *s.borrow())
}

/// Radio pins and peripherals, fixed on the Pico 2 W.
pub struct WifiPins {
    pub pwr: Peri<'static, PIN_23>,
    pub dio: Peri<'static, PIN_24>,
    pub cs: Peri<'static, PIN_25>,
    pub clk: Peri<'static, PIN_29>,
    pub pio: Peri<'static, PIO0>,
    pub dma: Peri<'static, DMA_CH0>,
}

#[embassy_executor::task]
async fn cyw43_task(
    runner: cyw43::Runner<'static, Output<'static>, PioSpi<'static, PIO0, 0, DMA_CH0>>,
) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, cyw43::NetDriver<'static>>) -> ! {
    runner.run().await
}

/// Bring up the radio and the IP stack, spawn their tasks and return the
/// link handle plus the stack for the MQTT session.
///
/// Must be called exactly once.
pub async fn init(spawner: Spawner, pins: WifiPins, seed: u64) -> (CywLink, Stack<'static>) {
    let fw = cyw43_firmware::CYW43_43439A0;
    let clm = cyw43_firmware::CYW43_43439A0_CLM;

    let pwr = Output::new(pins.pwr, Level::Low);
    let cs = Output::new(pins.cs, Level::High);
    let mut pio = Pio::new(pins.pio, Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        DEFAULT_CLOCK_DIVIDER,
        pio.irq0,
        cs,
        pins.dio,
        pins.clk,
        pins.dma,
    );

    static STATE: StaticCell<cyw43::State> = StaticCell::new();
    let state = STATE.init(cyw43::State::new());
    let (net_device, mut control, runner) = cyw43::new(state, pwr, spi, fw).await;
    unwrap!(spawner.spawn(cyw43_task(runner)));

    control.init(clm).await;
    control
        .set_power_management(cyw43::PowerManagementMode::PowerSave)
        .await;

    static RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
    let (stack, runner) = embassy_net::new(
        net_device,
        Config::dhcpv4(Default::default()),
        RESOURCES.init(StackResources::new()),
        seed,
    );
    unwrap!(spawner.spawn(net_task(runner)));
    unwrap!(spawner.spawn(wifi_task(control, stack)));

    info!("WiFi: radio ready");
    (CywLink { stack }, stack)
}

/// Owns the radio control handle and executes join/leave requests.
#[embassy_executor::task]
async fn wifi_task(mut control: Control<'static>, stack: Stack<'static>) -> ! {
    let mut pending = None;
    loop {
        let request = match pending.take() {
            Some(request) => request,
            None => REQUEST.wait().await,
        };
        match request {
            Request::Leave => {
                control.leave().await;
                set_status(LinkStatus::Idle);
            }
            Request::Join { ssid, psk } => {
                set_status(LinkStatus::Associating);
                pending = join(&mut control, stack, &ssid, &psk).await;
            }
        }
    }
}

/// Join and wait for an address, then watch the link until it drops.
/// Returns a request that arrived in the meantime.
async fn join(
    control: &mut Control<'static>,
    stack: Stack<'static>,
    ssid: &str,
    psk: &str,
) -> Option<Request> {
    let joined = select(
        control.join(ssid, JoinOptions::new(psk.as_bytes())),
        REQUEST.wait(),
    )
    .await;
    match joined {
        Either::First(Ok(())) => {}
        Either::First(Err(e)) => {
            warn!("WiFi: join failed, status={}", e.status);
            set_status(LinkStatus::Failed);
            return None;
        }
        Either::Second(request) => return Some(request),
    }

    if let Either::Second(request) = select(stack.wait_config_up(), REQUEST.wait()).await {
        return Some(request);
    }
    set_status(LinkStatus::Up);

    if let Either::Second(request) = select(stack.wait_config_down(), REQUEST.wait()).await {
        return Some(request);
    }
    warn!("WiFi: link down");
    set_status(LinkStatus::Failed);
    None
}

/// [`WifiLink`] backed by the radio task.
pub struct CywLink {
    stack: Stack<'static>,
}

impl WifiLink for CywLink {
    fn begin(&mut self, ssid: &str, psk: &str) {
        let mut s = String::new();
        let mut p = String::new();
        if s.push_str(ssid).is_err() || p.push_str(psk).is_err() {
            warn!("WiFi: credentials too long");
            set_status(LinkStatus::Failed);
            return;
        }
        set_status(LinkStatus::Associating);
        REQUEST.signal(Request::Join { ssid: s, psk: p });
    }

    fn status(&self) -> LinkStatus {
        status()
    }

    fn disconnect(&mut self) {
        REQUEST.signal(Request::Leave);
    }

    fn local_ip(&self) -> Option<[u8; 4]> {
        self.stack
            .config_v4()
            .map(|config| config.address.address().octets())
    }

    fn rssi(&self) -> Option<i8> {
        None
    }
}
