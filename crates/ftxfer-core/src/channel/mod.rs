//! Channel lifecycle
//!
//! A [`Channel`] owns at most one device handle and tracks which protocol it
//! was configured for. Switching protocol always closes the old handle
//! first, so the observed state sequence for an SPI to I²C switch is
//! `Open(SPI) -> Closed -> Initializing(I2C) -> Open(I2C)`.
//!
//! The backend is abstracted by [`ChannelDriver`]. Its handle type carries
//! both transport traits; the channel hands it out only when the state says
//! the matching protocol is configured.

mod config;
mod shared;

pub use config::{
    ChipSelect, I2cClockRate, I2cConfig, ParseClockRateError, PinState, SpiConfig, SpiMode,
};
pub use shared::SharedChannel;

use crate::error::{Error, Result, Status};
use crate::i2c::{I2cBus, I2cEngine};
use crate::spi::{SpiBus, SpiEngine};
use crate::transport::{I2cTransport, SpiTransport};
use core::fmt;
use core::num::NonZeroUsize;

/// Protocol a channel is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// SPI master
    Spi,
    /// I²C master
    I2c,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Spi => f.write_str("SPI"),
            Mode::I2c => f.write_str("I2C"),
        }
    }
}

/// Lifecycle state of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// No handle held
    #[default]
    Closed,
    /// Handle is being acquired and configured
    Initializing(Mode),
    /// Handle configured and ready for transfers
    Open(Mode),
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelState::Closed => f.write_str("closed"),
            ChannelState::Initializing(mode) => write!(f, "initializing ({})", mode),
            ChannelState::Open(mode) => write!(f, "open ({})", mode),
        }
    }
}

/// Backend that opens, configures and closes device handles
///
/// Every method reports failure as a bare [`Status`]; the channel wraps it
/// with the lifecycle context.
pub trait ChannelDriver {
    /// Open device handle, usable for either protocol once configured
    type Handle: SpiTransport + I2cTransport;

    /// Open the device for `mode`
    fn acquire(&mut self, mode: Mode) -> core::result::Result<Self::Handle, Status>;

    /// Configure an acquired handle as SPI master
    fn init_spi(
        &mut self,
        handle: &mut Self::Handle,
        config: &SpiConfig,
    ) -> core::result::Result<(), Status>;

    /// Configure an acquired handle as I²C master
    fn init_i2c(
        &mut self,
        handle: &mut Self::Handle,
        config: &I2cConfig,
    ) -> core::result::Result<(), Status>;

    /// Apply new SPI settings to a handle that is already open as SPI
    /// master, without reopening the device
    fn change_spi(
        &mut self,
        handle: &mut Self::Handle,
        config: &SpiConfig,
    ) -> core::result::Result<(), Status>;

    /// Close a handle
    fn release(&mut self, handle: Self::Handle) -> core::result::Result<(), Status>;
}

type Observer = Box<dyn FnMut(ChannelState) + Send>;

/// One physical channel and its lifecycle
pub struct Channel<D: ChannelDriver> {
    driver: D,
    handle: Option<D::Handle>,
    state: ChannelState,
    observer: Option<Observer>,
    spi_engine: SpiEngine,
    i2c_engine: I2cEngine,
}

impl<D: ChannelDriver> Channel<D> {
    /// Create a closed channel
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            handle: None,
            state: ChannelState::Closed,
            observer: None,
            spi_engine: SpiEngine::new(),
            i2c_engine: I2cEngine::new(),
        }
    }

    /// Report every state transition to `observer`
    pub fn with_observer(mut self, observer: impl FnMut(ChannelState) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Use a segment size below the 64 KiB link limit
    pub fn with_max_segment(mut self, max_segment: NonZeroUsize) -> Self {
        self.spi_engine = SpiEngine::with_max_segment(max_segment);
        self.i2c_engine = I2cEngine::with_max_segment(max_segment);
        self
    }

    /// Current state
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Configured protocol, if open
    pub fn mode(&self) -> Option<Mode> {
        match self.state {
            ChannelState::Open(mode) => Some(mode),
            _ => None,
        }
    }

    /// The backend driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn transition(&mut self, state: ChannelState) {
        log::debug!("Channel {} -> {}", self.state, state);
        self.state = state;
        if let Some(observer) = self.observer.as_mut() {
            observer(state);
        }
    }

    /// (Re)open the channel as SPI master
    pub fn init_spi(&mut self, config: &SpiConfig) -> Result<()> {
        log::debug!(
            "SPI init: {} Hz, mode {}, CS on ADBUS{}",
            config.clock_rate,
            config.mode.number(),
            config.chip_select.pin()
        );
        self.reinit(Mode::Spi, |driver, handle| driver.init_spi(handle, config))
    }

    /// (Re)open the channel as I²C master
    pub fn init_i2c(&mut self, config: &I2cConfig) -> Result<()> {
        log::debug!("I2C init: {} ({} Hz)", config.clock_rate, config.clock_rate.hz());
        self.reinit(Mode::I2c, |driver, handle| driver.init_i2c(handle, config))
    }

    fn reinit<F>(&mut self, mode: Mode, configure: F) -> Result<()>
    where
        F: FnOnce(&mut D, &mut D::Handle) -> core::result::Result<(), Status>,
    {
        // The previous handle is gone either way; a failed release does not
        // stop the new open
        if let Err(e) = self.close() {
            log::warn!("{}", e);
        }

        self.transition(ChannelState::Initializing(mode));

        let mut handle = match self.driver.acquire(mode) {
            Ok(handle) => handle,
            Err(status) => {
                self.transition(ChannelState::Closed);
                return Err(Error::InitFailed { mode, status });
            }
        };

        if let Err(status) = configure(&mut self.driver, &mut handle) {
            if let Err(e) = self.driver.release(handle) {
                log::warn!("Failed to release handle after {} init failure: {}", mode, e);
            }
            self.transition(ChannelState::Closed);
            return Err(Error::InitFailed { mode, status });
        }

        self.handle = Some(handle);
        self.transition(ChannelState::Open(mode));
        Ok(())
    }

    /// Change chip-select and clocking of an open SPI channel in place
    ///
    /// The handle is kept and no state transition is reported. Fails with
    /// [`Error::NotOpen`] unless the channel is open in SPI mode.
    pub fn change_spi(&mut self, config: &SpiConfig) -> Result<()> {
        let (ChannelState::Open(Mode::Spi), Some(handle)) = (self.state, self.handle.as_mut())
        else {
            return Err(Error::NotOpen {
                expected: Mode::Spi,
                state: self.state,
            });
        };

        log::debug!(
            "SPI change: {} Hz, mode {}, CS on ADBUS{}",
            config.clock_rate,
            config.mode.number(),
            config.chip_select.pin()
        );
        self.driver
            .change_spi(handle, config)
            .map_err(|status| Error::ChangeFailed {
                mode: Mode::Spi,
                status,
            })
    }

    /// Release the handle, if any
    ///
    /// The channel ends up closed even when the driver reports an error.
    pub fn close(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let released = self.driver.release(handle);
        self.transition(ChannelState::Closed);
        released.map_err(Error::ReleaseFailed)
    }

    /// SPI bus, if the channel is open in SPI mode
    pub fn spi(&mut self) -> Result<SpiBus<'_, D::Handle>> {
        match (self.state, self.handle.as_mut()) {
            (ChannelState::Open(Mode::Spi), Some(handle)) => {
                Ok(SpiBus::new(handle, self.spi_engine))
            }
            _ => Err(Error::NotOpen {
                expected: Mode::Spi,
                state: self.state,
            }),
        }
    }

    /// I²C bus, if the channel is open in I²C mode
    pub fn i2c(&mut self) -> Result<I2cBus<'_, D::Handle>> {
        match (self.state, self.handle.as_mut()) {
            (ChannelState::Open(Mode::I2c), Some(handle)) => {
                Ok(I2cBus::new(handle, self.i2c_engine))
            }
            _ => Err(Error::NotOpen {
                expected: Mode::I2c,
                state: self.state,
            }),
        }
    }

    /// Close the channel and give the driver back
    pub fn into_driver(mut self) -> D {
        if let Err(e) = self.close() {
            log::warn!("{}", e);
        }
        self.driver
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::flags::{I2cTransferOptions, SpiTransferOptions};
    use crate::testing::StubBus;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Event {
        Acquire(Mode),
        InitSpi,
        InitI2c,
        ChangeSpi(SpiConfig),
        Release,
    }

    #[derive(Debug, Default)]
    pub(crate) struct RecordingDriver {
        pub events: Vec<Event>,
        pub fail_acquire: Option<Status>,
        pub fail_init: Option<Status>,
        pub fail_change: Option<Status>,
        pub fail_release: Option<Status>,
        /// Handles handed back through `release`, oldest first
        pub released: Vec<StubBus>,
    }

    impl ChannelDriver for RecordingDriver {
        type Handle = StubBus;

        fn acquire(&mut self, mode: Mode) -> core::result::Result<StubBus, Status> {
            self.events.push(Event::Acquire(mode));
            match self.fail_acquire {
                Some(status) => Err(status),
                None => Ok(StubBus::new()),
            }
        }

        fn init_spi(
            &mut self,
            _handle: &mut StubBus,
            _config: &SpiConfig,
        ) -> core::result::Result<(), Status> {
            self.events.push(Event::InitSpi);
            self.fail_init.map_or(Ok(()), Err)
        }

        fn init_i2c(
            &mut self,
            _handle: &mut StubBus,
            _config: &I2cConfig,
        ) -> core::result::Result<(), Status> {
            self.events.push(Event::InitI2c);
            self.fail_init.map_or(Ok(()), Err)
        }

        fn change_spi(
            &mut self,
            _handle: &mut StubBus,
            config: &SpiConfig,
        ) -> core::result::Result<(), Status> {
            self.events.push(Event::ChangeSpi(config.clone()));
            self.fail_change.map_or(Ok(()), Err)
        }

        fn release(&mut self, handle: StubBus) -> core::result::Result<(), Status> {
            self.events.push(Event::Release);
            self.released.push(handle);
            self.fail_release.map_or(Ok(()), Err)
        }
    }

    type StateLog = Arc<Mutex<Vec<ChannelState>>>;

    fn observed(driver: RecordingDriver) -> (Channel<RecordingDriver>, StateLog) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let channel =
            Channel::new(driver).with_observer(move |state| sink.lock().unwrap().push(state));
        (channel, log)
    }

    #[test]
    fn test_spi_to_i2c_reinit_sequence() {
        let (mut channel, log) = observed(RecordingDriver::default());

        channel.init_spi(&SpiConfig::default()).unwrap();
        log.lock().unwrap().clear();
        channel.driver.events.clear();

        channel.init_i2c(&I2cConfig::default()).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                ChannelState::Closed,
                ChannelState::Initializing(Mode::I2c),
                ChannelState::Open(Mode::I2c),
            ]
        );
        assert_eq!(
            channel.driver().events,
            vec![Event::Release, Event::Acquire(Mode::I2c), Event::InitI2c]
        );
        assert_eq!(channel.state(), ChannelState::Open(Mode::I2c));
        assert_eq!(channel.mode(), Some(Mode::I2c));
    }

    #[test]
    fn test_first_init_from_closed() {
        let (mut channel, log) = observed(RecordingDriver::default());
        channel.init_spi(&SpiConfig::default()).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![ChannelState::Initializing(Mode::Spi), ChannelState::Open(Mode::Spi)]
        );
        assert_eq!(
            channel.driver().events,
            vec![Event::Acquire(Mode::Spi), Event::InitSpi]
        );
    }

    #[test]
    fn test_acquire_failure_leaves_closed() {
        let driver = RecordingDriver {
            fail_acquire: Some(Status::DeviceNotFound),
            ..Default::default()
        };
        let (mut channel, log) = observed(driver);

        let err = channel.init_spi(&SpiConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::InitFailed {
                mode: Mode::Spi,
                status: Status::DeviceNotFound
            }
        ));
        assert_eq!(channel.state(), ChannelState::Closed);
        assert_eq!(
            *log.lock().unwrap(),
            vec![ChannelState::Initializing(Mode::Spi), ChannelState::Closed]
        );
        assert!(channel.spi().is_err());
    }

    #[test]
    fn test_init_failure_releases_handle() {
        let driver = RecordingDriver {
            fail_init: Some(Status::InvalidParameter),
            ..Default::default()
        };
        let mut channel = Channel::new(driver);

        assert!(channel.init_i2c(&I2cConfig::default()).is_err());
        assert_eq!(channel.state(), ChannelState::Closed);
        assert_eq!(
            channel.driver().events,
            vec![Event::Acquire(Mode::I2c), Event::InitI2c, Event::Release]
        );
    }

    #[test]
    fn test_change_spi_keeps_handle() {
        let (mut channel, log) = observed(RecordingDriver::default());
        channel.init_spi(&SpiConfig::default()).unwrap();
        log.lock().unwrap().clear();
        channel.driver.events.clear();

        let config = SpiConfig::default()
            .mode(SpiMode::Mode3)
            .chip_select(ChipSelect::Adbus5, false);
        channel.change_spi(&config).unwrap();

        assert_eq!(channel.driver().events, vec![Event::ChangeSpi(config)]);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(channel.state(), ChannelState::Open(Mode::Spi));
        assert!(channel.spi().is_ok());
    }

    #[test]
    fn test_change_spi_requires_open_spi() {
        let mut channel = Channel::new(RecordingDriver::default());
        assert!(matches!(
            channel.change_spi(&SpiConfig::default()),
            Err(Error::NotOpen {
                expected: Mode::Spi,
                state: ChannelState::Closed
            })
        ));

        channel.init_i2c(&I2cConfig::default()).unwrap();
        channel.driver.events.clear();
        assert!(matches!(
            channel.change_spi(&SpiConfig::default()),
            Err(Error::NotOpen {
                state: ChannelState::Open(Mode::I2c),
                ..
            })
        ));
        assert!(channel.driver().events.is_empty());
    }

    #[test]
    fn test_change_spi_failure_stays_open() {
        let driver = RecordingDriver {
            fail_change: Some(Status::InvalidParameter),
            ..Default::default()
        };
        let mut channel = Channel::new(driver);
        channel.init_spi(&SpiConfig::default()).unwrap();

        assert!(matches!(
            channel.change_spi(&SpiConfig::default()),
            Err(Error::ChangeFailed {
                mode: Mode::Spi,
                status: Status::InvalidParameter
            })
        ));
        assert_eq!(channel.state(), ChannelState::Open(Mode::Spi));
        assert!(!channel.driver().events.contains(&Event::Release));
    }

    #[test]
    fn test_wrong_mode_rejected() {
        let mut channel = Channel::new(RecordingDriver::default());
        channel.init_spi(&SpiConfig::default()).unwrap();

        match channel.i2c() {
            Err(Error::NotOpen { expected, state }) => {
                assert_eq!(expected, Mode::I2c);
                assert_eq!(state, ChannelState::Open(Mode::Spi));
            }
            _ => panic!("expected NotOpen"),
        }
        assert!(channel.spi().is_ok());
    }

    #[test]
    fn test_closed_channel_has_no_bus() {
        let mut channel = Channel::new(RecordingDriver::default());
        assert!(matches!(
            channel.spi(),
            Err(Error::NotOpen {
                state: ChannelState::Closed,
                ..
            })
        ));
        // Closing a closed channel is a no-op
        channel.close().unwrap();
        assert!(channel.driver().events.is_empty());
    }

    #[test]
    fn test_release_failure_still_closes() {
        let driver = RecordingDriver {
            fail_release: Some(Status::IoError),
            ..Default::default()
        };
        let mut channel = Channel::new(driver);
        channel.init_spi(&SpiConfig::default()).unwrap();

        assert!(matches!(
            channel.close(),
            Err(Error::ReleaseFailed(Status::IoError))
        ));
        assert_eq!(channel.state(), ChannelState::Closed);
    }

    #[test]
    fn test_transfers_reach_handle() {
        let mut channel = Channel::new(RecordingDriver::default())
            .with_max_segment(NonZeroUsize::new(4).unwrap());

        channel.init_spi(&SpiConfig::default()).unwrap();
        let n = channel
            .spi()
            .unwrap()
            .write(&[1, 2, 3, 4, 5, 6], SpiTransferOptions::FRAMED)
            .unwrap();
        assert_eq!(n, 6);

        channel.init_i2c(&I2cConfig::default()).unwrap();
        let data = channel
            .i2c()
            .unwrap()
            .read_vec(0x50, 2, I2cTransferOptions::FRAMED)
            .unwrap();
        assert_eq!(data, vec![0, 1]);

        let driver = channel.into_driver();
        assert_eq!(driver.released.len(), 2);
        assert_eq!(driver.released[0].wire, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(driver.released[0].calls.len(), 2);
        assert_eq!(driver.released[1].calls.len(), 1);
    }
}
