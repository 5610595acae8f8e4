use log::info;

use crate::decode::{RawFrame, ThpDecoder};
use crate::error::TransportError;
use crate::frame::FrameSynchronizer;
use crate::models::SensorKind;
use crate::station::Station;
use crate::transport::{LineSource, TransportFactory};

/// Lambrecht thermo-hygro-barometer on a serial line.
///
/// The sensor transmits continuously, so the loop is paced by frame arrival.
pub struct ThpStation<F: TransportFactory> {
    factory: F,
    link: Option<FrameSynchronizer<F::Transport>>,
    decoder: ThpDecoder,
}

impl<F> ThpStation<F>
where
    F: TransportFactory,
    F::Transport: LineSource,
{
    pub fn new(factory: F, decoder: ThpDecoder) -> Self {
        Self {
            factory,
            link: None,
            decoder,
        }
    }
}

impl<F> Station for ThpStation<F>
where
    F: TransportFactory,
    F::Transport: LineSource,
{
    type Decoder = ThpDecoder;

    fn kind(&self) -> SensorKind {
        SensorKind::Thp
    }

    fn decoder(&self) -> &ThpDecoder {
        &self.decoder
    }

    async fn acquire(&mut self) -> Result<RawFrame, TransportError> {
        if self.link.is_none() {
            let source = self.factory.open().await?;
            info!("Serial line opened, waiting for frame start");
            self.link = Some(FrameSynchronizer::thp(source));
        }
        let link = self.link.as_mut().ok_or(TransportError::NotConnected)?;
        link.next_frame().await
    }

    fn drop_transport(&mut self) {
        self.link = None;
    }

    fn sample_period(&self) -> Option<std::time::Duration> {
        None
    }
}
