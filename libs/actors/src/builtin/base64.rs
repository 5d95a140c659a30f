//! Base64 encode and decode transforms (standard alphabet)

use super::transform::{Transform, TransformActor};
use crate::actor::Actor;
use crate::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flow_config::Params;
use flow_types::{Message, MessageStatus};
use std::sync::Arc;

pub fn build_encoder(name: &str, ctx: &Context, _params: &Params) -> Result<Arc<dyn Actor>> {
    Ok(Arc::new(TransformActor::new(name, ctx, Encode)))
}

pub fn build_decoder(name: &str, ctx: &Context, _params: &Params) -> Result<Arc<dyn Actor>> {
    Ok(Arc::new(TransformActor::new(name, ctx, Decode)))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Encode;

#[derive(Debug, Default, Clone, Copy)]
pub struct Decode;

impl Transform for Encode {
    fn apply(&self, msg: &mut Message) -> std::result::Result<(), MessageStatus> {
        let encoded = STANDARD.encode(msg.body());
        msg.set_body(encoded.into_bytes());
        Ok(())
    }
}

impl Transform for Decode {
    fn apply(&self, msg: &mut Message) -> std::result::Result<(), MessageStatus> {
        let decoded = STANDARD
            .decode(msg.body())
            .map_err(|_| MessageStatus::Invalid)?;
        msg.set_body(decoded);
        Ok(())
    }
}
