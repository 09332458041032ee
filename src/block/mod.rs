
use log::error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::TrackingErr;

#[cfg(test)]
mod tests;

pub enum BlockResult<U> {
	NotReady,
	Ready(U),
	Err(TrackingErr)
}

// A type that implements BlockFunctionality consumes instances of T and
// produces either Ready(U) if an output is ready, NotReady if an output
// is not ready, or Err(_) if the operation fails
pub trait BlockFunctionality<C: Clone, D, T: Clone, U> {

	// Requiring immutable references to the input and control values and requiring them
	// to implement Clone is the least restrictive thing because if the block needs an owned
	// value, it can clone it (if sent to another thread, for example)
	fn control(&mut self, control:&C) -> Result<D, &'static str>;
	fn apply(&mut self, input:&T) -> BlockResult<U>;

}

/// Runs a `BlockFunctionality` on its own task, fed and drained through bounded channels
pub struct Block<C: 'static + Send, T: 'static + Send, U: 'static + Send> {
	pub tx_control: mpsc::Sender<C>,
	pub tx_input:   mpsc::Sender<T>,
	pub rx_output:  mpsc::Receiver<U>,
	pub handles:    Vec<JoinHandle<Result<(), TrackingErr>>>,
}

impl<C: Send + Sync + Clone, T: Send + Sync + Clone, U: Send + Sync> Block<C, T, U> {

	pub fn from<B: 'static + BlockFunctionality<C, (), T, U> + Send + Sync>(b:B) -> Self {

		let (   tx_control, mut rx_control) = mpsc::channel::<C>(10);
		let (     tx_input,   mut rx_input) = mpsc::channel::<T>(10);
		let (mut tx_output,      rx_output) = mpsc::channel::<U>(10);

		let handle:JoinHandle<Result<(), TrackingErr>> = tokio::spawn(async move {

			let mut owned_b = b;

			while let Some(t) = rx_input.recv().await {

				// Interleaving control handling with input handling prevents us from having to
				// use a mutex to protect the state
				while let Ok(c) = rx_control.try_recv() {
					owned_b.control(&c).map_err(TrackingErr::Block)?;
				}

				match owned_b.apply(&t) {
					BlockResult::Ready(u) => tx_output.send(u).await.map_err(|_| TrackingErr::Block("Unable to send output"))?,
					BlockResult::NotReady => (),
					BlockResult::Err(e)   => {
						error!("Error in block: {}", e);
						return Err(e);
					}
				}

			}

			Ok(())
		});

		let handles = vec![handle];

		Block{ tx_control, tx_input, rx_output, handles }
	}

	/// Closes the inputs and waits for the task, returning the error that stopped it, if any
	pub async fn shutdown(self) -> Result<(), TrackingErr> {

		let Block{ tx_control, tx_input, rx_output:_, handles } = self;

		drop(tx_control);
		drop(tx_input);

		for handle in handles {
			handle.await.map_err(|_| TrackingErr::Block("Block task did not run to completion"))??;
		}

		Ok(())
	}

}
