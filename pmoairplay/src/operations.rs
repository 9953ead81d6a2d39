use std::net::IpAddr;

use async_trait::async_trait;
use axum::body::Bytes;

use crate::errors::AirPlayError;

/// What an AirPlay endpoint can ask of the device behind it.
///
/// Every request first goes through [`bind_client`](Self::bind_client)
/// with the sender address. Route operations receive the same address
/// and must claim the device again in the same step as their own work,
/// so a sender that lost the device in between gets
/// [`AirPlayError::Busy`] instead of acting for the new holder.
#[async_trait]
pub trait AirPlayOperations: Send + Sync {
    /// Claims the device for `client`. [`AirPlayError::Busy`] when another
    /// sender holds it.
    async fn bind_client(&self, client: IpAddr) -> Result<(), AirPlayError>;

    /// `(duration, position)` of the current media, in seconds.
    async fn get_scrub(&self, client: IpAddr) -> Result<(f64, f64), AirPlayError>;

    async fn is_playing(&self, client: IpAddr) -> Result<bool, AirPlayError>;

    /// Seeks to `position` seconds.
    async fn set_scrub(&self, client: IpAddr, position: f64) -> Result<(), AirPlayError>;

    /// Starts `location`; `start_position` is a fraction of the duration.
    async fn play(
        &self,
        client: IpAddr,
        location: &str,
        start_position: f64,
    ) -> Result<(), AirPlayError>;

    async fn stop(&self, client: IpAddr) -> Result<(), AirPlayError>;

    /// The reverse HTTP channel request.
    async fn reverse(&self, client: IpAddr) -> Result<(), AirPlayError>;

    /// `0.0` pauses, `1.0` resumes.
    async fn rate(&self, client: IpAddr, speed: f64) -> Result<(), AirPlayError>;

    async fn photo(
        &self,
        client: IpAddr,
        data: Bytes,
        transition: Option<String>,
    ) -> Result<(), AirPlayError>;
}
