#![no_std]
#![no_main]

// Required for ESP-IDF bootloader compatibility
// Use explicit parameters to ensure correct efuse block revision values
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::uart::{Uart, UartRx, UartTx};
use esp_hal::Async;
use static_cell::StaticCell;

use uart_console_firmware::config::console::{RX_BUFFER_COUNT, RX_BUFFER_SIZE};
use uart_console_firmware::line::LineEcho;
use uart_console_firmware::logger;
use uart_console_firmware::pal::Console;
use uart_console_firmware::tasks;
use uart_console_firmware::uart::esp::{esp_config, EspUart};
use uart_console_firmware::uart::UartConfig;

/// Console bound to the ESP32-S3 UART binding
type EspConsole = Console<&'static EspUart, RX_BUFFER_COUNT, RX_BUFFER_SIZE>;

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

/// Hand-off point between the console and the UART pump tasks
static UART_DRIVER: EspUart = EspUart::new();

/// The console instance (needed for 'static lifetime in tasks)
static CONSOLE: StaticCell<EspConsole> = StaticCell::new();

#[esp_hal::main]
fn main() -> ! {
    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Logging goes to USB-JTAG, the console owns UART0
    logger::init(log::LevelFilter::Info).unwrap();

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Configure UART0 (TX = GPIO43, RX = GPIO44) from the console line settings
    let config = UartConfig::default();
    let uart = Uart::new(
        peripherals.UART0,
        esp_config(&config).expect("Unsupported UART configuration"),
    )
    .expect("Failed to configure UART0")
    .with_rx(peripherals.GPIO44)
    .with_tx(peripherals.GPIO43)
    .into_async();
    let (uart_rx, uart_tx) = uart.split();

    let console: &'static EspConsole = CONSOLE.init(Console::new(&UART_DRIVER));

    // Create and run the embassy executor
    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(async_main(spawner, uart_rx, uart_tx, console, config));
    })
}

#[embassy_executor::task]
async fn async_main(
    spawner: Spawner,
    uart_rx: UartRx<'static, Async>,
    uart_tx: UartTx<'static, Async>,
    console: &'static EspConsole,
    config: UartConfig,
) {
    // Spawn the pumps first so the console can talk to the hardware
    spawner.spawn(log_task()).unwrap();
    spawner.spawn(uart_tx_task(uart_tx, console)).unwrap();
    spawner.spawn(uart_rx_task(uart_rx, console)).unwrap();

    if let Err(e) = console.open(&config) {
        log::error!("Console open failed: {:?}, restarting", e);
        // Give the log task a chance to print before the reset
        Timer::after(Duration::from_millis(100)).await;
        console.reset(|| esp_hal::system::software_reset()).await;
        return;
    }

    if let Err(e) = console.print_banner().await {
        log::warn!("Banner not written: {:?}", e);
    }

    spawner.spawn(console_task(console)).unwrap();
}

/// Task that feeds UART0 input into the console's receive slots
#[embassy_executor::task]
async fn uart_rx_task(uart_rx: UartRx<'static, Async>, console: &'static EspConsole) {
    tasks::uart_rx_pump(uart_rx, &UART_DRIVER, console).await;
}

/// Task that drains the console's staged writes to UART0
#[embassy_executor::task]
async fn uart_tx_task(uart_tx: UartTx<'static, Async>, console: &'static EspConsole) {
    tasks::uart_tx_pump(uart_tx, &UART_DRIVER, console).await;
}

/// Task that drains received slots and echoes complete lines
#[embassy_executor::task]
async fn console_task(console: &'static EspConsole) {
    tasks::console_task(console, LineEcho::new(console)).await;
}

/// Task that prints buffered log messages
#[embassy_executor::task]
async fn log_task() {
    tasks::log_task().await;
}
