//! The MPI surface of §6, narrowed to a trait so the core never depends on
//! a real MPI library being present (§6, §9: "a dummy single-process shim
//! must implement the same surface so a build without a real MPI library
//! still runs identically on one rank").
//!
//! Grounded on the teacher's direct use of the `mpi` crate in
//! `src/distributed.rs`/`src/distributed_octree.rs`
//! (`UserCommunicator`, `point_to_point`, `Process::send`/`receive_into`);
//! `MpiTransport` wraps that same crate behind the `mpi` feature, and
//! `SingleProcessTransport` is the dummy shim, always compiled in.

/// One pending point-to-point message: `(destination_or_source_rank, tag,
/// payload)`.
pub type Message = (i32, i32, Vec<u8>);

/// The collective + point-to-point surface component J needs. All
/// collective calls are suspension points (§5); `exchange` packages the
/// non-blocking send/recv/`Waitall` triad of §4.J step 4 into one call so
/// callers never have to reason about request handles.
pub trait Transport {
    fn rank(&self) -> i32;
    fn size(&self) -> i32;

    fn barrier(&self);

    /// Every rank's `value`, indexed by rank.
    fn allgather_i64(&self, value: i64) -> Vec<i64>;

    fn allreduce_sum_i64(&self, value: i64) -> i64;

    fn allreduce_xor_u32(&self, value: u32) -> u32;

    /// Sends `sends[i] = (destination, tag, bytes)` and returns, for each
    /// `source` in `recv_from`, the bytes received from that source on the
    /// same tag convention repartition uses (a single dedicated tag, so
    /// ranks need not agree on receive order — §5). Blocks until all of
    /// this rank's posted sends and receives complete, matching the
    /// `isend`/`irecv` + `Waitall` shape of §4.J step 4.
    fn exchange(&self, sends: Vec<Message>, recv_from: &[i32]) -> Vec<Message>;

    fn abort(&self, message: &str) -> ! {
        log::error!("[rank {}] fatal: {message}", self.rank());
        std::process::abort();
    }
}

/// The always-available single-process shim (§9): send-to-self is an
/// in-memory copy, `Waitall` on zero requests is a no-op, and every
/// collective is the identity on a communicator of size 1.
#[derive(Default)]
pub struct SingleProcessTransport;

impl Transport for SingleProcessTransport {
    fn rank(&self) -> i32 {
        0
    }

    fn size(&self) -> i32 {
        1
    }

    fn barrier(&self) {}

    fn allgather_i64(&self, value: i64) -> Vec<i64> {
        vec![value]
    }

    fn allreduce_sum_i64(&self, value: i64) -> i64 {
        value
    }

    fn allreduce_xor_u32(&self, value: u32) -> u32 {
        value
    }

    fn exchange(&self, sends: Vec<Message>, recv_from: &[i32]) -> Vec<Message> {
        debug_assert!(
            sends.iter().all(|(dest, _, _)| *dest == 0),
            "single-process transport can only send to rank 0"
        );
        debug_assert!(
            recv_from.iter().all(|&r| r == 0),
            "single-process transport can only receive from rank 0"
        );
        sends
    }
}

/// MPI-backed transport, compiled only with the `mpi` feature. Mirrors the
/// teacher's direct `UserCommunicator`/`point_to_point` usage.
#[cfg(feature = "mpi")]
pub mod mpi_transport {
    use super::{Message, Transport};
    use mpi::topology::{Communicator, Rank};
    use mpi::traits::*;

    pub struct MpiTransport<'a> {
        pub world: &'a dyn Communicator,
    }

    impl<'a> Transport for MpiTransport<'a> {
        fn rank(&self) -> i32 {
            self.world.rank()
        }

        fn size(&self) -> i32 {
            self.world.size()
        }

        fn barrier(&self) {
            self.world.barrier();
        }

        fn allgather_i64(&self, value: i64) -> Vec<i64> {
            let mut out = vec![0i64; self.world.size() as usize];
            self.world.all_gather_into(&value, &mut out[..]);
            out
        }

        fn allreduce_sum_i64(&self, value: i64) -> i64 {
            let mut out = 0i64;
            self.world
                .all_reduce_into(&value, &mut out, &mpi::collective::SystemOperation::sum());
            out
        }

        fn allreduce_xor_u32(&self, value: u32) -> u32 {
            let mut out = 0u32;
            self.world
                .all_reduce_into(&value, &mut out, &mpi::collective::SystemOperation::bitxor());
            out
        }

        fn exchange(&self, sends: Vec<Message>, recv_from: &[i32]) -> Vec<Message> {
            const REPARTITION_TAG: i32 = 7;
            // A single dedicated tag makes each message self-describing by
            // (sender, receiver) alone (§5), so plain blocking send/receive
            // pairs are sufficient here.
            for (dest, _tag, bytes) in &sends {
                let process = self.world.process_at_rank(*dest as Rank);
                process.send_with_tag(bytes, REPARTITION_TAG);
            }
            let mut received = Vec::with_capacity(recv_from.len());
            for &source in recv_from {
                let process = self.world.process_at_rank(source as Rank);
                let (bytes, _status) = process.receive_vec_with_tag::<u8>(REPARTITION_TAG);
                received.push((source, REPARTITION_TAG, bytes));
            }
            received
        }
    }
}
