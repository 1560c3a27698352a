//! IP geolocation used to pick a user's timezone.

pub mod ipapi;
