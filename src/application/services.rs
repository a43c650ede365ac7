use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::application::overlay::render_overlay;
use crate::application::ports::{DetectOptions, DetectionPort, ImagePayload};
use crate::domain::{
    catalog::ClassCatalog,
    errors::{DomainError, DomainResult},
    geometry::RenderSurface,
    session::{summarize_detections, RequestToken, SessionMachine, SessionSnapshot},
    source::{decode_image, ImageFile, ImageHandle},
};

/// Parámetros de la sesión fijados al arrancar.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub max_width: u32,
    pub detect_timeout: Duration,
    pub options: DetectOptions,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_width: 800,
            detect_timeout: Duration::from_secs(30),
            options: DetectOptions::default(),
        }
    }
}

struct State {
    machine: SessionMachine,
    task: Option<AbortHandle>,
}

struct Inner {
    state: Mutex<State>,
    detector: Arc<dyn DetectionPort>,
    catalog: Arc<ClassCatalog>,
    settings: SessionSettings,
    tx: watch::Sender<SessionSnapshot>,
}

/// Orquestador de la sesión: selección -> decodificación -> detección -> render.
///
/// Cada selección aceptada lanza una tarea en el runtime. Una selección nueva
/// o un `reset` abortan la tarea anterior y, además, invalidan su token, así
/// que un resultado tardío nunca se aplica aunque el colaborador no sea cancelable.
/// Ninguna operación pública devuelve error: los fallos terminan en `Phase::Failed`.
pub struct SessionService {
    inner: Arc<Inner>,
    runtime: tokio::runtime::Handle,
}

impl SessionService {
    pub fn new(
        detector: Arc<dyn DetectionPort>,
        catalog: Arc<ClassCatalog>,
        settings: SessionSettings,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        let machine = SessionMachine::new();
        let (tx, _) = watch::channel(machine.snapshot());
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State { machine, task: None }),
                detector,
                catalog,
                settings,
                tx,
            }),
            runtime,
        }
    }

    pub fn catalog(&self) -> &Arc<ClassCatalog> {
        &self.inner.catalog
    }

    pub fn select_image(&self, file: ImageFile) {
        let mut state = self.inner.lock();
        match state.machine.select(&file) {
            Ok(token) => {
                if let Some(prev) = state.task.take() {
                    prev.abort();
                }
                info!(
                    "📥 Imagen seleccionada: {} ({} bytes, generación {})",
                    file.name,
                    file.bytes.len(),
                    token.generation()
                );
                let inner = self.inner.clone();
                let join = self.runtime.spawn(async move { inner.run(token, file).await });
                state.task = Some(join.abort_handle());
            }
            Err(e) => warn!("Selección rechazada: {}", e),
        }
        self.inner.publish(&state);
    }

    pub fn reset(&self) {
        let mut state = self.inner.lock();
        if let Some(prev) = state.task.take() {
            prev.abort();
        }
        state.machine.reset();
        info!("Sesión reiniciada");
        self.inner.publish(&state);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().machine.snapshot()
    }

    /// Receptor que se marca como cambiado en cada transición.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.tx.subscribe()
    }
}

impl Drop for SessionService {
    fn drop(&mut self) {
        if let Some(task) = self.inner.lock().task.take() {
            task.abort();
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &State) {
        self.tx.send_replace(state.machine.snapshot());
    }

    /// Aplica una transición si el token sigue vigente y notifica a los suscriptores.
    fn apply<F>(&self, token: RequestToken, f: F) -> bool
    where
        F: FnOnce(&mut SessionMachine) -> bool,
    {
        let mut state = self.lock();
        let applied = f(&mut state.machine);
        if applied {
            self.publish(&state);
        } else {
            debug!("Descartando resultado obsoleto (generación {})", token.generation());
        }
        applied
    }

    fn is_current(&self, token: RequestToken) -> bool {
        self.lock().machine.is_current(token)
    }

    fn fail(&self, token: RequestToken, err: DomainError) {
        if self.apply(token, |m| m.detection_failed(token, &err)) {
            warn!("❌ Sesión fallida ({:?}): {}", err.kind(), err);
        }
    }

    async fn run(self: Arc<Self>, token: RequestToken, file: ImageFile) {
        let handle = match decode(file).await {
            Ok(h) => h,
            Err(e) => return self.fail(token, e),
        };
        let surface = RenderSurface::fit(handle.dims(), self.settings.max_width);
        let payload = ImagePayload::from(&handle);
        let image = handle.image.clone();
        if !self.apply(token, |m| m.image_decoded(token, handle, surface)) {
            return;
        }

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.settings.detect_timeout,
            self.detector.detect(&payload, &self.settings.options),
        )
        .await;
        let detections = match outcome {
            Err(_) => return self.fail(token, DomainError::Timeout(self.settings.detect_timeout)),
            Ok(Err(e)) => return self.fail(token, e),
            Ok(Ok(list)) => list,
        };
        if let Err(e) = detections.validate() {
            return self.fail(token, e);
        }
        info!(
            "🔍 {} devolvió {} detecciones en {:.0}ms",
            self.detector.name(),
            detections.len(),
            started.elapsed().as_secs_f64() * 1000.0
        );

        if !self.is_current(token) {
            debug!("Generación {} superada antes de renderizar", token.generation());
            return;
        }
        let catalog = self.catalog.clone();
        let rendered = tokio::task::spawn_blocking(move || {
            let overlay = render_overlay(&image, &surface, &detections, &catalog);
            (detections, overlay)
        })
        .await;
        let (detections, overlay) = match rendered {
            Ok(r) => r,
            Err(e) => return self.fail(token, DomainError::Model(format!("render interrumpido: {e}"))),
        };

        let summary = summarize_detections(&detections, &self.catalog);
        if self.apply(token, |m| m.detections_received(token, detections, overlay)) {
            let summary = if summary.is_empty() { "sin objetos" } else { summary.as_str() };
            info!("✅ Resultados listos: {}", summary);
        }
    }
}

async fn decode(file: ImageFile) -> DomainResult<ImageHandle> {
    tokio::task::spawn_blocking(move || decode_image(&file))
        .await
        .map_err(|e| DomainError::Decode(format!("tarea de decodificación interrumpida: {e}")))?
}
