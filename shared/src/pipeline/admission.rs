use super::{Direction, DropReason, ExitTables, Flow, Sampler};

/// Sampler that never skips an event.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeepAll;

impl Sampler for KeepAll {
    fn sample_out(&self, _id: u32, _direction: Direction) -> bool {
        false
    }
}

/// Early rejection: interest set, sampling, then drop-on-failure.
pub fn admit<T, S>(id: u32, ret: i64, tables: &T, sampler: &S) -> Flow<u32>
where
    T: ExitTables,
    S: Sampler + ?Sized,
{
    if !tables.is_interesting(id) {
        return Err(DropReason::NotInteresting);
    }
    if sampler.sample_out(id, Direction::Exit) {
        return Err(DropReason::SampledOut);
    }
    if tables.drop_failed() && ret < 0 {
        return Err(DropReason::Failed);
    }
    Ok(id)
}
