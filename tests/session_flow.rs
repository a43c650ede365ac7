use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, watch};

use detect_overlay::adapters::detector::{MockDetector, RemoteDetector};
use detect_overlay::application::ports::{DetectOptions, DetectionPort, ImagePayload};
use detect_overlay::application::services::{SessionService, SessionSettings};
use detect_overlay::domain::catalog::ClassCatalog;
use detect_overlay::domain::detection::{BoxMode, Detection, DetectionList};
use detect_overlay::domain::errors::{DomainError, DomainResult, ErrorKind};
use detect_overlay::domain::session::{Phase, SessionSnapshot};
use detect_overlay::domain::source::ImageFile;

type Reply = oneshot::Sender<DomainResult<DetectionList>>;

/// Detector controlado desde el test: cada imagen (por nombre) espera su propio oneshot.
#[derive(Default)]
struct ScriptedDetector {
    pending: Mutex<HashMap<String, oneshot::Receiver<DomainResult<DetectionList>>>>,
}

impl ScriptedDetector {
    fn script(&self, name: &str) -> Reply {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(name.to_string(), rx);
        tx
    }
}

#[async_trait]
impl DetectionPort for ScriptedDetector {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn detect(&self, image: &ImagePayload, _options: &DetectOptions) -> DomainResult<DetectionList> {
        let rx = self.pending.lock().unwrap().remove(&image.name);
        match rx {
            Some(rx) => rx.await.unwrap_or_else(|_| Err(DomainError::Network("sin respuesta".into()))),
            None => Err(DomainError::Model("llamada no prevista".into())),
        }
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([200, 200, 200, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn image_file(name: &str, width: u32, height: u32) -> ImageFile {
    ImageFile::new(name, "image/png", png(width, height))
}

fn service(detector: Arc<dyn DetectionPort>, settings: SessionSettings) -> SessionService {
    SessionService::new(
        detector,
        Arc::new(ClassCatalog::coco()),
        settings,
        tokio::runtime::Handle::current(),
    )
}

async fn wait_until<F>(rx: &mut watch::Receiver<SessionSnapshot>, pred: F) -> SessionSnapshot
where
    F: FnMut(&SessionSnapshot) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("la sesión no llegó al estado esperado")
        .expect("canal cerrado")
        .clone()
}

fn one(class_id: u32) -> DetectionList {
    DetectionList::new(BoxMode::Normalized, vec![Detection::new(class_id, 0.9, [0.1, 0.1, 0.5, 0.5])])
}

#[tokio::test]
async fn mock_detector_reaches_ready_with_three_detections() {
    let svc = service(Arc::new(MockDetector::new()), SessionSettings::default());
    let mut rx = svc.subscribe();

    svc.select_image(image_file("street.png", 1000, 800));
    let snap = wait_until(&mut rx, |s| s.phase == Phase::Ready).await;

    assert_eq!(snap.detections.len(), 3);
    assert_eq!(snap.file_name.as_deref(), Some("street.png"));
    assert_eq!(snap.summary(), Some("3 objects detected"));
    assert!(snap.error.is_none());
    let overlay = snap.overlay.expect("superficie renderizada");
    assert_eq!(overlay.image.dimensions(), (800, 640));
    assert_eq!(overlay.boxes_drawn, 3);
}

#[tokio::test]
async fn newer_selection_wins_over_late_result() {
    let detector = Arc::new(ScriptedDetector::default());
    let reply_a = detector.script("a.png");
    let reply_b = detector.script("b.png");
    let svc = service(detector.clone(), SessionSettings::default());
    let mut rx = svc.subscribe();

    svc.select_image(image_file("a.png", 40, 40));
    let first = wait_until(&mut rx, |s| s.phase == Phase::Detecting).await;

    svc.select_image(image_file("b.png", 60, 30));
    wait_until(&mut rx, |s| s.phase == Phase::Detecting && s.generation > first.generation).await;

    // A responde tarde: no debe tocar la sesión de B.
    let _ = reply_a.send(Ok(one(0)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    let snap = svc.snapshot();
    assert_eq!(snap.phase, Phase::Detecting);
    assert_eq!(snap.file_name.as_deref(), Some("b.png"));

    reply_b.send(Ok(one(2))).unwrap();
    let snap = wait_until(&mut rx, |s| s.phase == Phase::Ready).await;
    assert_eq!(snap.file_name.as_deref(), Some("b.png"));
    assert_eq!(snap.detections.items[0].class_id, 2);
    assert_eq!(snap.surface.unwrap().pixel_size(), (60, 30));
}

#[tokio::test]
async fn slow_collaborator_times_out() {
    let detector = Arc::new(ScriptedDetector::default());
    let _never = detector.script("slow.png");
    let settings = SessionSettings {
        detect_timeout: Duration::from_millis(50),
        ..SessionSettings::default()
    };
    let svc = service(detector, settings);
    let mut rx = svc.subscribe();

    svc.select_image(image_file("slow.png", 20, 20));
    let snap = wait_until(&mut rx, |s| s.phase == Phase::Failed).await;

    assert_eq!(snap.error.unwrap().kind, ErrorKind::Timeout);
    assert!(snap.detections.is_empty());
    assert!(snap.overlay.is_none());
}

#[tokio::test]
async fn non_image_file_keeps_session_idle() {
    let svc = service(Arc::new(MockDetector::new()), SessionSettings::default());

    svc.select_image(ImageFile::new("notes.txt", "text/plain", b"hola".to_vec()));
    let snap = svc.snapshot();

    assert_eq!(snap.phase, Phase::Idle);
    assert_eq!(snap.error.unwrap().kind, ErrorKind::InvalidFileType);
    assert!(snap.source.is_none());
}

#[tokio::test]
async fn undecodable_image_fails_with_decode_error() {
    let svc = service(Arc::new(MockDetector::new()), SessionSettings::default());
    let mut rx = svc.subscribe();

    svc.select_image(ImageFile::new("broken.png", "image/png", vec![0u8; 32]));
    let snap = wait_until(&mut rx, |s| s.phase == Phase::Failed).await;
    assert_eq!(snap.error.unwrap().kind, ErrorKind::DecodeError);
}

#[tokio::test]
async fn reset_discards_in_flight_result() {
    let detector = Arc::new(ScriptedDetector::default());
    let reply = detector.script("a.png");
    let svc = service(detector, SessionSettings::default());
    let mut rx = svc.subscribe();

    svc.select_image(image_file("a.png", 30, 30));
    wait_until(&mut rx, |s| s.phase == Phase::Detecting).await;
    svc.reset();

    let _ = reply.send(Ok(one(0)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    let snap = svc.snapshot();
    assert_eq!(snap.phase, Phase::Idle);
    assert!(snap.detections.is_empty());
    assert!(snap.file_name.is_none());
}

#[tokio::test]
async fn failure_is_recoverable_by_selecting_again() {
    let detector = Arc::new(ScriptedDetector::default());
    let fail = detector.script("a.png");
    let succeed = detector.script("b.png");
    let svc = service(detector, SessionSettings::default());
    let mut rx = svc.subscribe();

    svc.select_image(image_file("a.png", 30, 30));
    wait_until(&mut rx, |s| s.phase == Phase::Detecting).await;
    fail.send(Err(DomainError::Network("conexión rechazada".into()))).unwrap();
    let failed = wait_until(&mut rx, |s| s.phase == Phase::Failed).await;
    assert_eq!(failed.error.unwrap().kind, ErrorKind::NetworkError);

    svc.select_image(image_file("b.png", 30, 30));
    wait_until(&mut rx, |s| s.phase == Phase::Detecting).await;
    succeed.send(Ok(DetectionList::new(BoxMode::Normalized, Vec::new()))).unwrap();
    let snap = wait_until(&mut rx, |s| s.phase == Phase::Ready).await;
    assert!(snap.error.is_none());
    assert_eq!(snap.summary(), Some("No objects detected"));
}

#[tokio::test]
async fn malformed_detections_are_a_model_error() {
    let detector = Arc::new(ScriptedDetector::default());
    let reply = detector.script("a.png");
    let svc = service(detector, SessionSettings::default());
    let mut rx = svc.subscribe();

    svc.select_image(image_file("a.png", 30, 30));
    wait_until(&mut rx, |s| s.phase == Phase::Detecting).await;
    let bad = DetectionList::new(BoxMode::Normalized, vec![Detection::new(0, 1.7, [0.1, 0.1, 0.2, 0.2])]);
    reply.send(Ok(bad)).unwrap();

    let snap = wait_until(&mut rx, |s| s.phase == Phase::Failed).await;
    assert_eq!(snap.error.unwrap().kind, ErrorKind::ModelError);
}

#[tokio::test]
async fn subscribers_see_every_phase() {
    let svc = service(
        Arc::new(MockDetector::with_delay(Duration::from_millis(200))),
        SessionSettings::default(),
    );
    let mut rx = svc.subscribe();

    svc.select_image(image_file("a.png", 10, 10));
    wait_until(&mut rx, |s| s.phase == Phase::Detecting).await;
    wait_until(&mut rx, |s| s.phase == Phase::Ready).await;
    svc.reset();
    let snap = wait_until(&mut rx, |s| s.phase == Phase::Idle).await;
    assert!(snap.overlay.is_none());
}

#[tokio::test]
async fn non_image_file_does_not_interrupt_request_in_flight() {
    let detector = Arc::new(ScriptedDetector::default());
    let reply = detector.script("a.png");
    let svc = service(detector, SessionSettings::default());
    let mut rx = svc.subscribe();

    svc.select_image(image_file("a.png", 30, 30));
    let detecting = wait_until(&mut rx, |s| s.phase == Phase::Detecting).await;

    svc.select_image(ImageFile::new("notes.txt", "text/plain", b"hola".to_vec()));
    let snap = svc.snapshot();
    assert_eq!(snap.phase, Phase::Detecting);
    assert_eq!(snap.generation, detecting.generation);
    assert_eq!(snap.file_name.as_deref(), Some("a.png"));
    assert_eq!(snap.error.unwrap().kind, ErrorKind::InvalidFileType);

    reply.send(Ok(one(0))).unwrap();
    let snap = wait_until(&mut rx, |s| s.phase == Phase::Ready).await;
    assert_eq!(snap.file_name.as_deref(), Some("a.png"));
    assert_eq!(snap.detections.len(), 1);
    assert!(snap.error.is_none());
}

#[tokio::test]
async fn unresponsive_remote_service_fails_with_timeout() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    // mismo plazo en el cliente HTTP y en la sesión
    let timeout = Duration::from_millis(150);
    let remote = RemoteDetector::new(format!("http://{addr}/detect"), BoxMode::Normalized, timeout).unwrap();
    let settings = SessionSettings {
        detect_timeout: timeout,
        ..SessionSettings::default()
    };
    let svc = service(Arc::new(remote), settings);
    let mut rx = svc.subscribe();

    svc.select_image(image_file("a.png", 20, 20));
    let snap = wait_until(&mut rx, |s| s.phase == Phase::Failed).await;
    assert_eq!(snap.error.unwrap().kind, ErrorKind::Timeout);
}
