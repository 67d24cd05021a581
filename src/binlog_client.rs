//! Binlog 클라이언트
//!
//! 인증이 끝난 연결 위에서 COM_BINLOG_DUMP를 보내고 이벤트 스트림을 끝까지 읽는다.

use crate::binlog::EventRegistry;
use crate::config::StreamConfig;
use crate::error::Result;
use crate::protocol::PacketChannel;
use crate::stream::{BinlogListener, BinlogStream, StreamNotification, StreamState};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// COM_BINLOG_DUMP 명령어 코드
pub const COM_BINLOG_DUMP: u8 = 0x12;

/// 서버가 더 보낼 이벤트가 없으면 기다리지 않고 EOF를 보내도록 하는 플래그
pub const BINLOG_DUMP_NON_BLOCK: u16 = 0x01;

/// 스트림 시작 요청 파라미터
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinlogDumpRequest {
    /// 요청하는 쪽의 서버 ID (replica ID)
    pub server_id: u32,
    /// 시작 binlog 파일명. 비어 있으면 서버의 첫 파일
    pub binlog_filename: String,
    pub binlog_position: u32,
    pub flags: u16,
}

impl BinlogDumpRequest {
    pub fn new(server_id: u32, binlog_filename: impl Into<String>, binlog_position: u32) -> Self {
        BinlogDumpRequest {
            server_id,
            binlog_filename: binlog_filename.into(),
            binlog_position,
            flags: 0,
        }
    }

    pub fn with_flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    /// COM_BINLOG_DUMP 명령어 생성
    pub fn to_packet(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(11 + self.binlog_filename.len());

        buffer.write_u8(COM_BINLOG_DUMP)?;
        buffer.write_u32::<LittleEndian>(self.binlog_position)?;
        buffer.write_u16::<LittleEndian>(self.flags)?;
        buffer.write_u32::<LittleEndian>(self.server_id)?;
        // 파일명은 패킷 끝까지 (null terminator 없음)
        buffer.write_all(self.binlog_filename.as_bytes())?;

        Ok(buffer)
    }
}

/// Binlog 클라이언트
pub struct BinlogClient {
    config: StreamConfig,
    registry: EventRegistry,
}

impl BinlogClient {
    pub fn new(config: StreamConfig) -> Self {
        BinlogClient {
            config,
            registry: EventRegistry::default(),
        }
    }

    pub fn with_registry(config: StreamConfig, registry: EventRegistry) -> Self {
        BinlogClient { config, registry }
    }

    /// dump 요청을 보내고 스트림이 끝날 때까지 이벤트를 `listener`로 전달
    ///
    /// 스트림이 정상 종료되면 리스너를 돌려준다.
    pub async fn run<S, L>(&self, channel: &mut PacketChannel<S>, listener: L) -> Result<L>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        L: BinlogListener,
    {
        let request = self.config.dump_request();

        let mut frames = Vec::new();
        let mut stream =
            BinlogStream::start_with_registry(&mut frames, &request, self.registry.clone(), listener)?;
        channel.write_frames(&frames).await?;

        info!(
            "Starting binlog streaming from {}:{}",
            request.binlog_filename, request.binlog_position
        );

        loop {
            let packet = channel.read_packet().await?;
            match stream.feed(&packet) {
                Ok(StreamState::Ended) => break,
                Ok(StreamState::Streaming) => {}
                Err(e) if !e.is_fatal() => {
                    debug!("Undecodable event payload: {}", e);
                    stream.listener_mut().on_decode_error(e)?;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Binlog streaming ended. Total events received: {}",
            stream.event_count()
        );
        Ok(stream.into_listener())
    }

    /// 백그라운드 태스크에서 스트리밍하고 알림 채널을 돌려준다
    ///
    /// 스트림을 끝낸 에러는 `JoinHandle`의 결과로 받는다. 이때 채널에는 `Ended`가 오지 않는다.
    pub fn spawn<S>(
        self,
        mut channel: PacketChannel<S>,
    ) -> (
        mpsc::UnboundedReceiver<StreamNotification>,
        JoinHandle<Result<()>>,
    )
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            match self.run(&mut channel, tx).await {
                Ok(_) => {
                    info!("Binlog streaming ended");
                    Ok(())
                }
                Err(e) => {
                    error!("Binlog streaming error: {}", e);
                    Err(e)
                }
            }
        });

        (rx, handle)
    }
}
