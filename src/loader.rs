//! # 字节加载模块
//!
//! ## 设计思路
//!
//! 把各种非位图输入统一加载为编码字节，并尽早校验，尽快失败：
//! - URL：状态码 + 内容类型 + 体积限制 + 流式读取 + 签名探测
//! - 本地文件：允许目录校验 + metadata 体积限制 + 读取
//! - Data URL：格式解析 + 解码前体积估算
//! - 内存字节：空内容与体积校验后直接透传
//!
//! ## 实现思路
//!
//! - 网络错误统一映射为 `PixelError::Network`（下载超时同样属于加载失败，
//!   与队列的 `Timeout` 区分开）。
//! - 每个 `.await` 边界都与取消信号竞争，取消后立即返回 `Cancelled`。

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use reqwest::Url;

use crate::config::PixeliftConfig;
use crate::error::PixelError;
use crate::format::{is_image_mime, probe_signature, validate_image_signature};
use crate::input::PixelInput;
use crate::options::DecodeOptions;

const STREAM_SIGNATURE_PROBE_BYTES: usize = 4096;
const BUFFER_INITIAL_CAPACITY: usize = 16 * 1024;
const ACCEPT_IMAGES: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

/// 按一次请求的配置快照加载输入字节。
#[derive(Debug, Clone)]
pub struct BufferLoader {
    config: PixeliftConfig,
}

impl BufferLoader {
    pub fn new(config: PixeliftConfig) -> Self {
        Self { config }
    }

    /// 加载任意非位图输入的编码字节。
    pub async fn load(&self, input: &PixelInput, options: &DecodeOptions) -> Result<Bytes, PixelError> {
        if options.is_cancelled() {
            return Err(PixelError::Cancelled);
        }

        match input {
            PixelInput::Url(url) => match url.scheme() {
                "http" | "https" => self.download(url, options).await,
                "file" => {
                    let path = url.to_file_path().map_err(|_| {
                        PixelError::InvalidFormat(format!("file URL 无法转换为本地路径：{}", url))
                    })?;
                    self.read_file(&path, options).await
                }
                other => Err(PixelError::InvalidFormat(format!("不支持的 URL 协议：{}", other))),
            },
            PixelInput::Path(path) => self.read_file(path, options).await,
            PixelInput::DataUrl(data) => {
                log::info!("📝 开始处理 Data URL 图片");
                let bytes = parse_data_url_with_limit(data, self.config.max_file_size)?;
                validate_image_signature(&bytes)?;
                Ok(Bytes::from(bytes))
            }
            PixelInput::Bytes(bytes) | PixelInput::Blob { bytes, .. } => {
                self.check_size(bytes.len() as u64)?;
                if bytes.is_empty() {
                    return Err(PixelError::InvalidFormat("输入内容为空".to_string()));
                }
                Ok(bytes.clone())
            }
            PixelInput::Bitmap(_) => Err(PixelError::InvalidFormat(
                "原始位图无需加载字节".to_string(),
            )),
        }
    }

    async fn download(&self, url: &Url, options: &DecodeOptions) -> Result<Bytes, PixelError> {
        log::info!("🌐 开始下载图片 - URL: {}", redact_url_for_log(url));

        let client = build_http_client(&self.config)?;
        let mut request = client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, ACCEPT_IMAGES);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        log::debug!("📡 发送 HTTP 请求...");
        let response = tokio::select! {
            biased;
            _ = options.cancelled() => return Err(PixelError::Cancelled),
            response = request.send() => response.map_err(|e| self.map_reqwest_error(e, url))?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(PixelError::Network(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status_message(status.as_u16())
            )));
        }

        if let Some(content_type) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
        {
            if !is_image_mime(content_type) && !content_type.starts_with("application/octet-stream") {
                return Err(PixelError::InvalidFormat(format!("不是图片类型：{}", content_type)));
            }
        }

        let total_len = response.content_length();
        if let Some(size) = total_len {
            self.check_size(size)?;
        }

        let initial_capacity = total_len
            .map(|len| len.min(self.config.max_file_size).min(usize::MAX as u64) as usize)
            .filter(|len| *len > 0)
            .unwrap_or(BUFFER_INITIAL_CAPACITY);
        let mut buffer = Vec::with_capacity(initial_capacity);
        let mut response = response;
        let mut signature_validated = false;
        let mut total: u64 = 0;

        loop {
            let next_chunk = tokio::select! {
                biased;
                _ = options.cancelled() => return Err(PixelError::Cancelled),
                chunk = response.chunk() => chunk.map_err(|e| self.map_reqwest_error(e, url))?,
            };

            let Some(chunk) = next_chunk else {
                break;
            };

            total = total.saturating_add(chunk.len() as u64);
            if total > self.config.max_file_size {
                return Err(PixelError::ResourceLimit("下载后文件超过大小限制".to_string()));
            }
            buffer.extend_from_slice(&chunk);

            if !signature_validated {
                signature_validated = probe_signature(&buffer, STREAM_SIGNATURE_PROBE_BYTES)?;
            }
        }

        if !signature_validated {
            validate_image_signature(&buffer)?;
        }

        log::debug!("✅ 下载完成 - {} bytes", total);
        Ok(Bytes::from(buffer))
    }

    async fn read_file(&self, path: &Path, options: &DecodeOptions) -> Result<Bytes, PixelError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", path.display());

        let path = self.guard_path(path).await?;

        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(PixelError::FileSystem(format!("不是普通文件：{}", path.display())));
        }
        self.check_size(metadata.len())?;

        let bytes = tokio::select! {
            biased;
            _ = options.cancelled() => return Err(PixelError::Cancelled),
            bytes = tokio::fs::read(&path) => bytes?,
        };

        validate_image_signature(&bytes)?;
        Ok(Bytes::from(bytes))
    }

    /// 配置了 `allowed_root` 时，规范化后的路径必须位于其下。
    async fn guard_path(&self, path: &Path) -> Result<PathBuf, PixelError> {
        let Some(root) = self.config.allowed_root.as_deref() else {
            return Ok(path.to_path_buf());
        };

        let root = tokio::fs::canonicalize(root)
            .await
            .map_err(|e| PixelError::Config(format!("allowed_root 无效：{}（{}）", root.display(), e)))?;
        let resolved = tokio::fs::canonicalize(path).await?;

        if !resolved.starts_with(&root) {
            return Err(PixelError::FileSystem(format!(
                "路径不在允许的目录内：{}",
                path.display()
            )));
        }

        Ok(resolved)
    }

    fn check_size(&self, size: u64) -> Result<(), PixelError> {
        if size > self.config.max_file_size {
            return Err(PixelError::ResourceLimit(format!(
                "文件过大：{:.2} MB（限制：{:.2} MB）",
                size as f64 / 1024.0 / 1024.0,
                self.config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }
        Ok(())
    }

    fn map_reqwest_error(&self, e: reqwest::Error, url: &Url) -> PixelError {
        let err_msg = e.to_string().replace(url.as_str(), &redact_url_for_log(url));

        if e.is_timeout() {
            PixelError::Network(format!("下载超时（{}秒）", self.config.download_timeout_secs))
        } else if e.is_connect() {
            PixelError::Network(format!("无法连接：{}", err_msg))
        } else if e.is_redirect() {
            PixelError::Network(format!("重定向次数超过限制（{}）", self.config.max_redirects))
        } else if e.is_builder() {
            PixelError::InvalidFormat(format!("请求参数无效：{}", err_msg))
        } else {
            PixelError::Network(format!("请求失败：{}", err_msg))
        }
    }
}

fn build_http_client(config: &PixeliftConfig) -> Result<reqwest::Client, PixelError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.download_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
        .build()
        .map_err(|e| PixelError::Network(format!("无法创建 HTTP 客户端：{}", e)))
}

/// 日志中去掉查询串与片段，避免泄露令牌。
fn redact_url_for_log(url: &Url) -> String {
    let host = url.host_str().unwrap_or("<unknown-host>");
    let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
    format!("{}://{}{}{}", url.scheme(), host, port, url.path())
}

fn status_message(code: u16) -> &'static str {
    match code {
        404 => "未找到",
        403 => "访问被拒绝",
        500..=599 => "服务器错误",
        _ => "请求失败",
    }
}

fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, PixelError> {
    let len = base64_data.trim().len() as u64;
    let groups = len
        .checked_add(3)
        .ok_or_else(|| PixelError::ResourceLimit("Base64 输入长度溢出".to_string()))?
        / 4;

    groups
        .checked_mul(3)
        .ok_or_else(|| PixelError::ResourceLimit("Base64 解码体积估算溢出".to_string()))
}

/// 解析 `data:<mime>;base64,<payload>`，解码前先按长度估算体积。
fn parse_data_url_with_limit(data: &str, max_file_size: u64) -> Result<Vec<u8>, PixelError> {
    let normalized = data.trim();

    let rest = normalized
        .strip_prefix("data:")
        .ok_or_else(|| PixelError::InvalidFormat("不是 Data URL".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| PixelError::InvalidFormat("Data URL 缺少数据段".to_string()))?;

    if !header.ends_with(";base64") {
        return Err(PixelError::InvalidFormat("缺少 base64 标记".to_string()));
    }

    let estimated_len = estimate_base64_decoded_upper_bound_len(payload)?;
    if estimated_len > max_file_size {
        return Err(PixelError::ResourceLimit(format!(
            "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
            estimated_len as f64 / 1024.0 / 1024.0,
            max_file_size as f64 / 1024.0 / 1024.0
        )));
    }

    general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| PixelError::InvalidFormat(format!("Base64 解码失败：{}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{Cursor, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use tokio_util::sync::CancellationToken;

    fn png_bytes() -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([1, 2, 3, 255]));
        let mut out = Cursor::new(Vec::new());
        image
            .write_to(&mut out, image::ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    fn serve_once(status_line: &'static str, content_type: &'static str, body: Vec<u8>) -> (String, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server failed");
        let addr = listener.local_addr().expect("read local addr failed");

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept failed");

            let mut req_buf = [0u8; 1024];
            let _ = stream.read(&mut req_buf);

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status_line,
                content_type,
                body.len()
            );

            stream.write_all(response.as_bytes()).expect("write headers failed");
            stream.write_all(&body).expect("write body failed");
            stream.flush().expect("flush failed");
        });

        (format!("http://127.0.0.1:{}/image.png", addr.port()), server)
    }

    fn loader() -> BufferLoader {
        BufferLoader::new(PixeliftConfig::default())
    }

    #[tokio::test]
    async fn downloads_png_over_http() {
        let png = png_bytes();
        let (url, server) = serve_once("200 OK", "image/png", png.clone());

        let result = loader()
            .load(&PixelInput::parse(&url), &DecodeOptions::default())
            .await;
        server.join().expect("server thread failed");

        assert_eq!(result.expect("download should succeed").as_ref(), png.as_slice());
    }

    #[tokio::test]
    async fn non_image_body_is_rejected_even_with_image_content_type() {
        let (url, server) = serve_once("200 OK", "image/png", b"hello world".to_vec());

        let result = loader()
            .load(&PixelInput::parse(&url), &DecodeOptions::default())
            .await;
        server.join().expect("server thread failed");

        assert!(matches!(result, Err(PixelError::InvalidFormat(_))));
    }

    #[tokio::test]
    async fn http_error_status_maps_to_network() {
        let (url, server) = serve_once("404 Not Found", "text/plain", b"missing".to_vec());

        let result = loader()
            .load(&PixelInput::parse(&url), &DecodeOptions::default())
            .await;
        server.join().expect("server thread failed");

        match result {
            Err(PixelError::Network(message)) => assert!(message.contains("404")),
            other => panic!("expected network error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn cancelled_signal_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();

        let result = loader()
            .load(
                &PixelInput::parse("https://example.invalid/a.png"),
                &DecodeOptions::default().with_signal(token),
            )
            .await;

        assert!(matches!(result, Err(PixelError::Cancelled)));
    }

    #[tokio::test]
    async fn data_url_is_decoded() {
        let png = png_bytes();
        let data_url = format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(&png));

        let bytes = loader()
            .load(&PixelInput::parse(&data_url), &DecodeOptions::default())
            .await
            .expect("data url should load");

        assert_eq!(bytes.as_ref(), png.as_slice());
    }

    #[test]
    fn data_url_limit_is_checked_before_decode() {
        let huge = format!("data:image/png;base64,{}", "A".repeat(1024 * 1024));
        let result = parse_data_url_with_limit(&huge, 32);

        assert!(matches!(result, Err(PixelError::ResourceLimit(_))));
    }

    #[test]
    fn data_url_without_base64_marker_is_rejected() {
        let result = parse_data_url_with_limit("data:image/svg+xml,<svg/>", u64::MAX);
        assert!(matches!(result, Err(PixelError::InvalidFormat(_))));
    }

    #[tokio::test]
    async fn file_outside_allowed_root_is_rejected() {
        let allowed = tempfile::tempdir().expect("create allowed dir");
        let outside = tempfile::tempdir().expect("create outside dir");
        let path = outside.path().join("a.png");
        std::fs::write(&path, png_bytes()).expect("write png");

        let loader = BufferLoader::new(PixeliftConfig {
            allowed_root: Some(allowed.path().to_path_buf()),
            ..PixeliftConfig::default()
        });

        let result = loader.load(&PixelInput::Path(path), &DecodeOptions::default()).await;
        assert!(matches!(result, Err(PixelError::FileSystem(_))));
    }

    #[tokio::test]
    async fn file_inside_allowed_root_loads() {
        let allowed = tempfile::tempdir().expect("create allowed dir");
        let path = allowed.path().join("a.png");
        std::fs::write(&path, png_bytes()).expect("write png");

        let loader = BufferLoader::new(PixeliftConfig {
            allowed_root: Some(allowed.path().to_path_buf()),
            ..PixeliftConfig::default()
        });

        let url = Url::from_file_path(&path).expect("file url");
        let bytes = loader
            .load(&PixelInput::Url(url), &DecodeOptions::default())
            .await
            .expect("file url should load");
        assert!(!bytes.is_empty());
    }

    #[tokio::test]
    async fn missing_file_maps_to_file_system() {
        let dir = tempfile::tempdir().expect("create dir");
        let result = loader()
            .load(&PixelInput::Path(dir.path().join("missing.png")), &DecodeOptions::default())
            .await;

        assert!(matches!(result, Err(PixelError::FileSystem(_))));
    }

    #[tokio::test]
    async fn empty_bytes_and_bitmaps_are_rejected() {
        let empty = loader()
            .load(&PixelInput::from(Vec::<u8>::new()), &DecodeOptions::default())
            .await;
        assert!(matches!(empty, Err(PixelError::InvalidFormat(_))));

        let bitmap = crate::input::RawBitmap {
            width: 1,
            height: 1,
            layout: crate::input::BitmapLayout::Rgba8,
            data: vec![0; 4],
        };
        let result = loader().load(&PixelInput::Bitmap(bitmap), &DecodeOptions::default()).await;
        assert!(matches!(result, Err(PixelError::InvalidFormat(_))));
    }

    #[tokio::test]
    async fn in_memory_buffers_respect_max_file_size() {
        let loader = BufferLoader::new(PixeliftConfig {
            max_file_size: 10,
            ..PixeliftConfig::default()
        });

        let bytes = loader
            .load(&PixelInput::from(png_bytes()), &DecodeOptions::default())
            .await;
        assert!(matches!(bytes, Err(PixelError::ResourceLimit(_))));

        let blob = PixelInput::Blob {
            bytes: Bytes::from(png_bytes()),
            mime_type: Some("image/png".to_string()),
        };
        let blob = loader.load(&blob, &DecodeOptions::default()).await;
        assert!(matches!(blob, Err(PixelError::ResourceLimit(_))));
    }

    #[test]
    fn redact_url_for_log_removes_query_and_fragment() {
        let url = Url::parse("https://example.com:8443/path/img.png?token=abc123#hash").expect("url");
        assert_eq!(redact_url_for_log(&url), "https://example.com:8443/path/img.png");
    }
}
