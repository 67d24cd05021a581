/// 캡처한 binlog 패킷 스트림 재생
///
/// 서버가 보낸 패킷(4 바이트 헤더 포함)을 그대로 저장한 파일을 읽어
/// 이벤트마다 한 줄씩 JSON으로 출력합니다.
use mysql_binlog_stream::events::EventData;
use mysql_binlog_stream::{
    BinlogError, BinlogEvent, BinlogListener, BinlogStream, PacketChannel, StreamConfig,
    StreamState, TextCodec,
};
use std::env;
use std::io::Write;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// 이벤트를 JSON 한 줄로 출력하는 리스너
struct JsonPrinter {
    codec: TextCodec,
}

impl BinlogListener for JsonPrinter {
    fn on_event(&mut self, event: BinlogEvent) -> mysql_binlog_stream::Result<()> {
        let mut value = serde_json::to_value(&event)?;
        value["name"] = event.name().into();

        // 클라이언트 문자셋으로 다시 읽은 쿼리
        if let EventData::Query(query) = &event.data {
            value["decodedQuery"] = query.decode_query(&self.codec)?.into();
        }

        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", value)?;
        Ok(())
    }

    fn on_end(&mut self) -> mysql_binlog_stream::Result<()> {
        info!("End of binlog stream");
        Ok(())
    }

    fn on_decode_error(&mut self, error: BinlogError) -> mysql_binlog_stream::Result<()> {
        warn!("Skipping event: {}", error);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 초기화
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let path = env::args()
        .nth(1)
        .ok_or("usage: binlog-replay <capture-file>")?;
    let config = StreamConfig::from_env();

    let file = tokio::fs::File::open(&path).await?;
    let mut channel = PacketChannel::new(file);

    // 캡처 파일에는 요청을 받을 서버가 없으므로 요청 패킷은 버린다
    let mut discarded = Vec::new();
    let printer = JsonPrinter {
        codec: config.text_codec(),
    };
    let mut stream = BinlogStream::start(&mut discarded, &config.dump_request(), printer)?;

    info!("Replaying {}", path);

    loop {
        let packet = match channel.read_packet().await {
            Ok(packet) => packet,
            Err(BinlogError::Io(e)) => {
                warn!("Capture ended without EOF packet: {}", e);
                break;
            }
            Err(e) => return Err(e.into()),
        };

        match stream.feed(&packet) {
            Ok(StreamState::Ended) => break,
            Ok(StreamState::Streaming) => {}
            Err(e) if !e.is_fatal() => stream.listener_mut().on_decode_error(e)?,
            Err(e) => return Err(e.into()),
        }
    }

    info!("Replayed {} events", stream.event_count());
    Ok(())
}
