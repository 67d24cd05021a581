//! Binlog 스트림 상태 머신
//!
//! dump 요청을 한 번 보낸 뒤(`start`) 도착하는 패킷을 하나씩 `feed`로 넣는다.
//! EOF 패킷을 받으면 `Ended`로 넘어가며 그 뒤로는 아무 패킷도 받지 않는다.

use crate::binlog::EventRegistry;
use crate::binlog_client::BinlogDumpRequest;
use crate::error::{BinlogError, Result};
use crate::events::{BinlogEvent, EventData};
use crate::packet::Packet;
use crate::protocol::{self, PacketSink};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// 스트림 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Streaming,
    Ended,
}

/// 리스너에게 전달되는 알림
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamNotification {
    Event(BinlogEvent),
    Ended,
}

/// 디코딩된 이벤트를 받는 쪽
pub trait BinlogListener {
    fn on_event(&mut self, event: BinlogEvent) -> Result<()>;

    fn on_end(&mut self) -> Result<()>;

    /// 이벤트 데이터만 깨진 경우. 기본 동작은 호출자에게 그대로 돌려준다.
    fn on_decode_error(&mut self, error: BinlogError) -> Result<()> {
        Err(error)
    }
}

impl BinlogListener for mpsc::UnboundedSender<StreamNotification> {
    fn on_event(&mut self, event: BinlogEvent) -> Result<()> {
        self.send(StreamNotification::Event(event))
            .map_err(|_| BinlogError::ChannelClosed)
    }

    fn on_end(&mut self) -> Result<()> {
        self.send(StreamNotification::Ended)
            .map_err(|_| BinlogError::ChannelClosed)
    }
}

/// 알림을 순서대로 모아 둔다
impl BinlogListener for Vec<StreamNotification> {
    fn on_event(&mut self, event: BinlogEvent) -> Result<()> {
        self.push(StreamNotification::Event(event));
        Ok(())
    }

    fn on_end(&mut self) -> Result<()> {
        self.push(StreamNotification::Ended);
        Ok(())
    }
}

/// Binlog 이벤트 스트림 디코더
pub struct BinlogStream<L> {
    state: StreamState,
    registry: EventRegistry,
    listener: L,
    event_count: u64,
}

impl<L: BinlogListener> BinlogStream<L> {
    /// dump 요청을 보내고 스트리밍 상태로 시작
    pub fn start<W: PacketSink>(sink: &mut W, request: &BinlogDumpRequest, listener: L) -> Result<Self> {
        Self::start_with_registry(sink, request, EventRegistry::default(), listener)
    }

    pub fn start_with_registry<W: PacketSink>(
        sink: &mut W,
        request: &BinlogDumpRequest,
        registry: EventRegistry,
        listener: L,
    ) -> Result<Self> {
        sink.send_packet(&request.to_packet()?, 0)?;
        debug!(
            "Sent COM_BINLOG_DUMP: file={}, position={}",
            request.binlog_filename, request.binlog_position
        );

        Ok(BinlogStream {
            state: StreamState::Streaming,
            registry,
            listener,
            event_count: 0,
        })
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// 지금까지 전달한 이벤트 수
    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    pub fn into_listener(self) -> L {
        self.listener
    }

    /// 패킷 하나를 처리
    ///
    /// 헤더를 읽지 못하면 `InvalidHeader`를 돌려주며 이 스트림은 더 쓰면 안 된다.
    /// 이벤트 데이터만 깨졌다면 `InvalidEvent`이고, 다음 패킷은 계속 넣을 수 있다.
    pub fn feed(&mut self, packet: &[u8]) -> Result<StreamState> {
        if self.state == StreamState::Ended {
            return Err(BinlogError::StreamEnded);
        }

        if protocol::is_eof_packet(packet) {
            info!("Received EOF packet - stream ended after {} events", self.event_count);
            self.state = StreamState::Ended;
            self.listener.on_end()?;
            return Ok(self.state);
        }

        if protocol::is_error_packet(packet) {
            let err = protocol::parse_error_packet(packet);
            error!("Received error packet from server: {}", err);
            return Err(err);
        }

        let mut cursor = Packet::new(packet);
        // 이벤트 앞의 OK 바이트
        cursor
            .read_u8()
            .map_err(|_| BinlogError::InvalidHeader("empty packet".to_string()))?;

        let event = self.registry.decode_event(&mut cursor)?;
        if event.data == EventData::Unknown {
            debug!("Unknown event type {} decoded as UNKNOWN", event.header.event_type);
        }
        debug!(
            "Event #{}: {} type={}, server_id={}, size={}, pos={}",
            self.event_count + 1,
            event.name(),
            event.header.event_type,
            event.header.server_id,
            event.header.event_size,
            event.header.log_pos
        );

        self.event_count += 1;
        self.listener.on_event(event)?;
        Ok(self.state)
    }
}
