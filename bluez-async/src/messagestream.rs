//! Adapts a `dbus-tokio` match-rule subscription into a plain `futures::Stream` of raw messages,
//! so several of them can be merged with `futures::stream::select_all` regardless of which match
//! rule produced a given message.

use dbus::nonblock::SyncConnection;
use dbus::Message;
use dbus_tokio::connection::MsgMatch;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

pub(crate) struct MessageStream {
    msg_match: MsgMatch,
    _connection: Arc<SyncConnection>,
}

impl MessageStream {
    pub(crate) fn new(msg_match: MsgMatch, connection: Arc<SyncConnection>) -> Self {
        MessageStream {
            msg_match,
            _connection: connection,
        }
    }
}

impl Stream for MessageStream {
    type Item = Message;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Message>> {
        let inner = unsafe { self.map_unchecked_mut(|s| &mut s.msg_match) };
        inner.poll_next(cx)
    }
}
