//! Image generation with persistence and the local helper fallback.

use std::sync::Arc;

use nexus_db::FilesystemBlobStore;
use nexus_inference::mock::{MockFailure, MockProvider};
use nexus_inference::{
    ArtifactPersister, BlobStore, Capability, Error, FallbackExecutor, HelperConfig,
    ImagePayload, ImageProvider, ImageRequest, ImageService, LocalHelper, ProviderKind,
    LOCAL_HELPER_LABEL,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgo=";
const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

struct Fixture {
    dir: TempDir,
    blobs: Arc<FilesystemBlobStore>,
    persister: Arc<ArtifactPersister>,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let blobs = Arc::new(FilesystemBlobStore::new(dir.path(), "https://files.example.com/"));
    let persister = Arc::new(
        ArtifactPersister::new(blobs.clone() as Arc<dyn BlobStore>, "generated_images").unwrap(),
    );
    Fixture {
        dir,
        blobs,
        persister,
    }
}

fn object_path(public_url: &str) -> &str {
    public_url
        .strip_prefix("https://files.example.com/")
        .expect("public url under base")
}

fn image_chain(providers: &[&MockProvider]) -> Arc<FallbackExecutor> {
    Arc::new(
        FallbackExecutor::default().with_image(
            providers
                .iter()
                .map(|p| Arc::new((*p).clone()) as Arc<dyn ImageProvider>)
                .collect(),
        ),
    )
}

#[tokio::test]
async fn test_inline_jpeg_is_stored_with_jpg_extension() {
    let fx = fixture();
    let payload = ImagePayload(format!(
        "data:image/jpeg;base64,{}",
        base64_encode(JPEG_BYTES)
    ));

    let artifact = fx.persister.persist(&payload, "openrouter/img").await.unwrap();

    assert_eq!(artifact.mime_type, "image/jpeg");
    assert_eq!(artifact.produced_by, "openrouter/img");
    assert_eq!(artifact.size_bytes, JPEG_BYTES.len() as u64);
    let path = object_path(&artifact.public_url);
    assert!(path.starts_with("generated_images/"));
    assert!(path.ends_with(".jpg"), "{path}");
    assert_eq!(fx.blobs.read(path).await.unwrap(), JPEG_BYTES);

    let sidecar = fx.blobs.sidecar(path).await.unwrap();
    assert_eq!(sidecar.content_type, "image/jpeg");
    assert_eq!(sidecar.metadata["producedBy"], "openrouter/img");
    assert!(sidecar.public);
}

#[tokio::test]
async fn test_remote_payload_uses_content_type_then_suffix() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/typed"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(JPEG_BYTES.to_vec(), "image/jpeg"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/untyped.jpeg"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(JPEG_BYTES.to_vec(), "application/octet-stream"),
        )
        .mount(&server)
        .await;
    let fx = fixture();

    let typed = fx
        .persister
        .persist(&ImagePayload(format!("{}/typed", server.uri())), "p")
        .await
        .unwrap();
    assert_eq!(typed.mime_type, "image/jpeg");

    let suffixed = fx
        .persister
        .persist(&ImagePayload(format!("{}/untyped.jpeg?sig=1", server.uri())), "p")
        .await
        .unwrap();
    assert_eq!(suffixed.mime_type, "image/jpeg");
    assert!(object_path(&suffixed.public_url).ends_with(".jpg"));
}

#[tokio::test]
async fn test_remote_not_found_is_download_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let fx = fixture();

    let err = fx
        .persister
        .persist(&ImagePayload(format!("{}/gone.png", server.uri())), "p")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DownloadFailed(ref m) if m.contains("404")), "{err:?}");
}

#[tokio::test]
async fn test_unsupported_payload_is_rejected() {
    let fx = fixture();
    let err = fx
        .persister
        .persist(&ImagePayload::from("ftp://example.com/a.png"), "p")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedPayload(_)));
}

#[tokio::test]
async fn test_failed_persist_moves_to_next_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let fx = fixture();
    let broken = MockProvider::new(ProviderKind::OpenRouter, "broken")
        .returning_image(format!("{}/missing.png", server.uri()));
    let good = MockProvider::new(ProviderKind::OpenRouter, "good").returning_image(PNG_DATA_URL);
    let service = ImageService::new(image_chain(&[&broken, &good]), fx.persister.clone());

    let artifact = service
        .generate(&ImageRequest::new("A lighthouse"))
        .await
        .unwrap();

    assert_eq!(artifact.produced_by, "openrouter/good");
    assert_eq!(artifact.mime_type, "image/png");
    assert_eq!(broken.call_count(), 1);
}

#[tokio::test]
async fn test_chain_failure_without_helper_surfaces_last_remote_error() {
    let fx = fixture();
    let a = MockProvider::new(ProviderKind::OpenRouter, "a").failing(MockFailure::Transport(500));
    let b = MockProvider::new(ProviderKind::OpenRouter, "b").returning_image("not-a-url");
    let helper = LocalHelper::new(
        HelperConfig::default().with_scripts(vec![fx.dir.path().join("absent.py")]),
    );
    let service =
        ImageService::new(image_chain(&[&a, &b]), fx.persister.clone()).with_helper(helper);

    let err = service
        .generate(&ImageRequest::new("A lighthouse"))
        .await
        .unwrap_err();

    match err {
        Error::AggregateFailure {
            capability,
            attempts,
            last,
        } => {
            assert_eq!(capability, Capability::Image);
            assert_eq!(attempts, 2);
            assert!(matches!(*last, Error::UnsupportedPayload(_)));
        }
        other => panic!("Expected AggregateFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_remote_404_with_absent_helper_reports_download_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/images/expired.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let fx = fixture();
    let a = MockProvider::new(ProviderKind::Gemini, "a").failing(MockFailure::Transport(503));
    let b = MockProvider::new(ProviderKind::OpenRouter, "b")
        .returning_image(format!("{}/images/expired.png", server.uri()));
    let helper = LocalHelper::new(
        HelperConfig::default().with_scripts(vec![fx.dir.path().join("absent.py")]),
    );
    let service =
        ImageService::new(image_chain(&[&a, &b]), fx.persister.clone()).with_helper(helper);

    let err = service
        .generate(&ImageRequest::new("A lighthouse"))
        .await
        .unwrap_err();

    match err {
        Error::AggregateFailure {
            capability,
            attempts,
            last,
        } => {
            assert_eq!(capability, Capability::Image);
            assert_eq!(attempts, 2);
            assert!(matches!(*last, Error::DownloadFailed(ref m) if m.contains("404")), "{last:?}");
        }
        other => panic!("Expected AggregateFailure, got {other:?}"),
    }
    assert_eq!(b.call_count(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_blank_prompt_is_rejected() {
    let fx = fixture();
    let service = ImageService::new(image_chain(&[]), fx.persister.clone());
    let err = service.generate(&ImageRequest::new("  ")).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[cfg(unix)]
mod helper_process {
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use super::*;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let script = dir.join(name);
        std::fs::write(&script, body).unwrap();
        script
    }

    fn sh_helper(script: PathBuf) -> HelperConfig {
        HelperConfig::default()
            .with_scripts(vec![script])
            .with_interpreters(vec!["nexus-missing-interpreter".to_string(), "sh".to_string()])
    }

    fn failing_chain() -> (MockProvider, Arc<FallbackExecutor>) {
        let remote = MockProvider::new(ProviderKind::OpenRouter, "openai/gpt-5-image-mini")
            .failing(MockFailure::Transport(503));
        let chain = image_chain(&[&remote]);
        (remote, chain)
    }

    #[tokio::test]
    async fn test_helper_rescues_failed_chain() {
        let fx = fixture();
        let script = write_script(
            fx.dir.path(),
            "gen.sh",
            "[ \"$2\" = \"openai/gpt-5-image-mini\" ] || exit 3\n\
             printf '%s' '{\"status\":\"ok\",\"image_url\":\"data:image/png;base64,iVBORw0KGgo=\"}'\n",
        );
        let (_, chain) = failing_chain();
        let service = ImageService::new(chain, fx.persister.clone())
            .with_helper(LocalHelper::new(sh_helper(script)));

        let artifact = service
            .generate(&ImageRequest::new("A lighthouse"))
            .await
            .unwrap();

        assert_eq!(artifact.produced_by, LOCAL_HELPER_LABEL);
        assert_eq!(artifact.mime_type, "image/png");
        assert!(object_path(&artifact.public_url).contains("local-helper"));
    }

    #[tokio::test]
    async fn test_helper_error_counts_as_extra_attempt() {
        let fx = fixture();
        let script = write_script(
            fx.dir.path(),
            "gen.sh",
            "printf '%s' '{\"status\":\"error\",\"message\":\"quota exhausted\"}'\n",
        );
        let (_, chain) = failing_chain();
        let service = ImageService::new(chain, fx.persister.clone())
            .with_helper(LocalHelper::new(sh_helper(script)));

        let err = service
            .generate(&ImageRequest::new("A lighthouse"))
            .await
            .unwrap_err();

        match err {
            Error::AggregateFailure { attempts, last, .. } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, Error::HelperError(ref m) if m == "quota exhausted"));
            }
            other => panic!("Expected AggregateFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_credential_reaches_helper_process() {
        let fx = fixture();
        let script = write_script(
            fx.dir.path(),
            "gen.sh",
            "printf '{\"status\":\"ok\",\"image_url\":\"https://cdn.example.com/%s.png\"}' \"$NEXUS_TEST_HELPER_KEY\"\n",
        );
        let config = HelperConfig {
            credential_env: "NEXUS_TEST_HELPER_KEY".to_string(),
            ..sh_helper(script)
        }
        .with_credential("s3cret");

        let payload = LocalHelper::new(config)
            .generate("m", &ImageRequest::new("x"))
            .await
            .unwrap()
            .expect("helper ran");
        assert_eq!(payload.as_str(), "https://cdn.example.com/s3cret.png");
    }

    #[tokio::test]
    async fn test_helper_timeout_is_error() {
        let fx = fixture();
        let script = write_script(fx.dir.path(), "slow.sh", "sleep 5\n");
        let config = sh_helper(script).with_timeout(Duration::from_millis(200));

        let err = LocalHelper::new(config)
            .generate("m", &ImageRequest::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HelperError(ref m) if m.contains("timed out")), "{err:?}");
    }

    #[tokio::test]
    async fn test_oversized_output_is_error() {
        let fx = fixture();
        let script = write_script(
            fx.dir.path(),
            "noisy.sh",
            "i=0; while [ $i -lt 200 ]; do printf 'xxxxxxxxxx'; i=$((i+1)); done\n",
        );
        let config = sh_helper(script).with_max_output_bytes(256);

        let err = LocalHelper::new(config)
            .generate("m", &ImageRequest::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HelperError(ref m) if m.contains("exceeded")), "{err:?}");
    }

    #[tokio::test]
    async fn test_no_interpreter_yields_none() {
        let fx = fixture();
        let script = write_script(fx.dir.path(), "gen.sh", "exit 0\n");
        let config = HelperConfig::default()
            .with_scripts(vec![script])
            .with_interpreters(vec!["nexus-missing-interpreter".to_string()]);

        let outcome = LocalHelper::new(config)
            .generate("m", &ImageRequest::new("x"))
            .await
            .unwrap();
        assert!(outcome.is_none());
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
