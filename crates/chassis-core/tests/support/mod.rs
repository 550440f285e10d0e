//! 管道测试共用的记录型处理器与内存 Channel。

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chassis_core::channel::{Channel, ChannelId};
use chassis_core::error::ChannelError;
use chassis_core::exception::Exception;
use chassis_core::pipeline::{
    ActiveHandler, Attachment, Event, EventHandler, ExceptionHandler, Handler, HandlerContext,
    InactiveHandler, InboundHandler, Message, OutboundHandler, Pipeline,
};
use chassis_transport::Buffers;

pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().expect("journal lock").clone()
}

/// 声明全部六类能力、记录访问顺序并原样转发的处理器。
pub struct Recorder {
    name: String,
    journal: Journal,
}

impl Recorder {
    pub fn new(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_owned(),
            journal: Arc::clone(journal),
        }
    }

    fn record(&self, event: &str) {
        self.journal
            .lock()
            .expect("journal lock")
            .push(format!("{}:{event}", self.name));
    }
}

impl Handler for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_active(&self) -> Option<&dyn ActiveHandler> {
        Some(self)
    }

    fn as_inbound(&self) -> Option<&dyn InboundHandler> {
        Some(self)
    }

    fn as_outbound(&self) -> Option<&dyn OutboundHandler> {
        Some(self)
    }

    fn as_exception(&self) -> Option<&dyn ExceptionHandler> {
        Some(self)
    }

    fn as_inactive(&self) -> Option<&dyn InactiveHandler> {
        Some(self)
    }

    fn as_event(&self) -> Option<&dyn EventHandler> {
        Some(self)
    }
}

impl ActiveHandler for Recorder {
    fn handle_active(&self, ctx: &HandlerContext) {
        self.record("active");
        ctx.fire_channel_active();
    }
}

impl InboundHandler for Recorder {
    fn handle_read(&self, ctx: &HandlerContext, message: Message) {
        self.record("read");
        ctx.fire_channel_read(message);
    }
}

impl OutboundHandler for Recorder {
    fn handle_write(&self, ctx: &HandlerContext, message: Message) {
        self.record("write");
        ctx.fire_channel_write(message);
    }
}

impl ExceptionHandler for Recorder {
    fn handle_exception(&self, ctx: &HandlerContext, exception: Exception) {
        self.record("exception");
        ctx.fire_channel_exception(exception);
    }
}

impl InactiveHandler for Recorder {
    fn handle_inactive(&self, ctx: &HandlerContext, exception: Option<Exception>) {
        self.record("inactive");
        ctx.fire_channel_inactive(exception);
    }
}

impl EventHandler for Recorder {
    fn handle_event(&self, ctx: &HandlerContext, event: Event) {
        self.record("event");
        ctx.fire_channel_event(event);
    }
}

/// 只声明入站能力的处理器，用于验证能力过滤。
pub struct InboundOnly {
    name: String,
    journal: Journal,
}

impl InboundOnly {
    pub fn new(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_owned(),
            journal: Arc::clone(journal),
        }
    }
}

impl Handler for InboundOnly {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_inbound(&self) -> Option<&dyn InboundHandler> {
        Some(self)
    }
}

impl InboundHandler for InboundOnly {
    fn handle_read(&self, ctx: &HandlerContext, message: Message) {
        self.journal
            .lock()
            .expect("journal lock")
            .push(format!("{}:read", self.name));
        ctx.fire_channel_read(message);
    }
}

/// 没有任何能力的处理器。
pub struct Inert;

impl Handler for Inert {}

/// 记录写入与关闭的内存 Channel。
pub struct MemoryChannel {
    id: ChannelId,
    pipeline: Pipeline,
    attachment: Mutex<Option<Attachment>>,
    active: AtomicBool,
    serves: AtomicUsize,
    written: Mutex<Vec<Bytes>>,
    close_causes: Mutex<Vec<Option<String>>>,
}

impl MemoryChannel {
    pub fn new(id: u64, pipeline: &Pipeline) -> Arc<Self> {
        Arc::new(Self {
            id: ChannelId::new(id),
            pipeline: pipeline.clone(),
            attachment: Mutex::new(None),
            active: AtomicBool::new(true),
            serves: AtomicUsize::new(0),
            written: Mutex::new(Vec::new()),
            close_causes: Mutex::new(Vec::new()),
        })
    }

    pub fn serves(&self) -> usize {
        self.serves.load(Ordering::SeqCst)
    }

    pub fn written(&self) -> Vec<Bytes> {
        self.written.lock().expect("written lock").clone()
    }

    pub fn close_causes(&self) -> Vec<Option<String>> {
        self.close_causes.lock().expect("close lock").clone()
    }
}

impl Channel for MemoryChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    fn attachment(&self) -> Option<Attachment> {
        self.attachment.lock().expect("attachment lock").clone()
    }

    fn set_attachment(&self, attachment: Attachment) {
        *self.attachment.lock().expect("attachment lock") = Some(attachment);
    }

    fn writev(&self, buffers: Buffers) -> Result<(), ChannelError> {
        if !self.is_active() {
            return Err(ChannelError::Closed);
        }
        self.written
            .lock()
            .expect("written lock")
            .push(buffers.to_bytes());
        Ok(())
    }

    fn close(&self, exception: Option<Exception>) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.close_causes
                .lock()
                .expect("close lock")
                .push(exception.map(|ex| ex.to_string()));
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }

    fn serve(self: Arc<Self>) {
        self.serves.fetch_add(1, Ordering::SeqCst);
    }
}
