use std::io::Cursor;

use bytes::{Buf, BytesMut};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, BufWriter},
    net::TcpStream,
};

use crate::frame::{self, Frame};

// Connetction用于将Tcp流中的数据按照redis的协议，读取和写入为完整的Frame
// 客户端和测试用的server都用同一个Connection
#[derive(Debug)]
pub struct Connection {
    stream: BufWriter<TcpStream>,
    buffer: BytesMut,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Connection {
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// 读取一个完整的帧，对端正常关闭连接时返回 `None`
    pub async fn read_frame(&mut self) -> crate::Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                return Ok(Some(frame));
            }

            // 如果没有读取出frame，说明可能是buffer缓冲区数据不足 尝试从stream中读更多的数据到缓冲区内
            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                if self.buffer.is_empty() {
                    return Ok(None);
                } else {
                    return Err("connection reset by peer".into());
                }
            }
        }
    }

    /// 写入一个帧并flush
    pub async fn write_frame(&mut self, frame: &Frame) -> crate::Result<()> {
        let mut dst = BytesMut::new();
        frame.encode(&mut dst);

        self.stream.write_all(&dst).await?;
        self.stream.flush().await?;
        Ok(())
    }

    fn parse_frame(&mut self) -> crate::Result<Option<Frame>> {
        use frame::Error::Incomplete;
        // Cursor 用于记录现在读取到buffer中的哪个位置
        let mut buf = Cursor::new(&self.buffer[..]);

        match Frame::check(&mut buf) {
            Ok(_) => {
                let len = buf.position() as usize;

                buf.set_position(0);

                let frame = Frame::parse(&mut buf)?;

                self.buffer.advance(len);

                Ok(Some(frame))
            }
            Err(Incomplete) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
