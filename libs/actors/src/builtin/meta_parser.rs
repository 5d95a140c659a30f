//! MetaParser: lift a url-encoded prefix into metadata
//!
//! A frame `k1=v1&k2=v2 <payload>` becomes a message whose metadata holds
//! `k1`/`k2` and whose body is `<payload>`. Frames without a space pass
//! through untouched.

use super::transform::{Transform, TransformActor};
use crate::actor::Actor;
use crate::{Context, Result};
use flow_config::Params;
use flow_types::{Message, MessageStatus};
use std::sync::Arc;

pub fn build(name: &str, ctx: &Context, _params: &Params) -> Result<Arc<dyn Actor>> {
    Ok(Arc::new(TransformActor::new(name, ctx, MetaParser)))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MetaParser;

impl MetaParser {
    /// Split `frame` into decoded pairs and the payload
    pub fn parse(frame: &[u8]) -> std::result::Result<Option<(Vec<(String, String)>, &[u8])>, MessageStatus> {
        let Some(space) = frame.iter().position(|b| *b == b' ') else {
            return Ok(None);
        };
        let (prefix, payload) = (&frame[..space], &frame[space + 1..]);

        let mut pairs = Vec::new();
        for pair in prefix.split(|b| *b == b'&').filter(|p| !p.is_empty()) {
            if !pair.contains(&b'=') {
                return Err(MessageStatus::Invalid);
            }
            pairs.extend(url::form_urlencoded::parse(pair).into_owned());
        }
        Ok(Some((pairs, payload)))
    }
}

impl Transform for MetaParser {
    fn apply(&self, msg: &mut Message) -> std::result::Result<(), MessageStatus> {
        let body = msg.body_bytes();
        let Some((pairs, payload)) = Self::parse(&body)? else {
            return Ok(());
        };
        for (key, value) in pairs {
            msg.set_meta(key, value);
        }
        msg.set_body(body.slice_ref(payload));
        Ok(())
    }
}
