use tokio::sync::watch;

/// Resolves once `chan` carries `true`, for use as a tonic
/// `serve_with_shutdown` future.
pub async fn wait_from(mut chan: watch::Receiver<bool>) {
	while !*chan.borrow() {
		if chan.changed().await.is_err() {
			return;
		}
	}
}

/// Watch for a shutdown signal, returning a `watch::Receiver` that flips to
/// `true` once one arrives. Both binaries select on this to stop accepting
/// RPCs and let outstanding work drain.
#[cfg(unix)]
pub fn watch_shutdown_signal() -> watch::Receiver<bool> {
	use tokio::signal::unix::*;

	let (send_cancel, watch_cancel) = watch::channel(false);
	tokio::spawn(async move {
		let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
		let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
		let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");
		tokio::select! {
			_ = sigint.recv() => info!("received SIGINT, shutting down."),
			_ = sigterm.recv() => info!("received SIGTERM, shutting down."),
			_ = sighup.recv() => info!("received SIGHUP, shutting down."),
		}
		let _ = send_cancel.send(true);
	});
	watch_cancel
}

#[cfg(windows)]
pub fn watch_shutdown_signal() -> watch::Receiver<bool> {
	use tokio::signal::windows::*;

	let (send_cancel, watch_cancel) = watch::channel(false);
	tokio::spawn(async move {
		let mut sigint = ctrl_c().expect("failed to install Ctrl-C handler");
		sigint.recv().await;
		info!("received Ctrl-C, shutting down.");
		let _ = send_cancel.send(true);
	});
	watch_cancel
}
