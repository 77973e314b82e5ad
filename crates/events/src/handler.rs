/// Execute an aggregate command in memory: decide, then evolve.
///
/// 1. `aggregate.handle(command)` decides the events (no mutation).
/// 2. Each event is applied to the aggregate in order.
///
/// No persistence and no publication. Unit tests drive aggregates through
/// this; the infrastructure layer wraps the same two steps with a version
/// check and an append.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: stockmove_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
