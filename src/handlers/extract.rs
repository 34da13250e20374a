//! Request extractors whose rejections go through [`GmaoError`], so malformed
//! bodies, query strings and paths get the same localized error body as
//! every other failure.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::GmaoError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(GmaoError))]
pub struct GmaoJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(GmaoError))]
pub struct GmaoQuery<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(GmaoError))]
pub struct GmaoPath<T>(pub T);
