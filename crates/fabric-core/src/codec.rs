//! Conversions between the typed domain model (`fabric_types`) and the
//! generated protobuf messages (`fabric_proto`). This is the only place
//! that ever touches both.

use fabric_proto::proto;
use fabric_types::{CoarseResult, FabricError, SuccessorTask, Task, TaskId, TaskResult, ValueResult};

fn encode_value(value: &serde_json::Value) -> Result<Vec<u8>, FabricError> {
    serde_json::to_vec(value).map_err(|e| FabricError::Codec(e.to_string()))
}

fn decode_value(bytes: &[u8]) -> Result<serde_json::Value, FabricError> {
    serde_json::from_slice(bytes).map_err(|e| FabricError::Codec(e.to_string()))
}

pub fn task_to_proto(task: &Task) -> Result<proto::TaskMsg, FabricError> {
    let args = task
        .args
        .iter()
        .map(encode_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(proto::TaskMsg {
        id: task.id.to_string(),
        layer: task.layer,
        coarse: task.coarse,
        kind: task.kind.clone(),
        body: task.body.clone(),
        args,
        target_task_id: task.target_task_id.to_string(),
        target_slot: task.target_slot as u32,
        origin_computer_id: task.origin_computer_id,
    })
}

pub fn task_from_proto(msg: proto::TaskMsg) -> Result<Task, FabricError> {
    let args = msg
        .args
        .iter()
        .map(|b| decode_value(b))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Task {
        id: msg.id.parse::<TaskId>()?,
        layer: msg.layer,
        coarse: msg.coarse,
        kind: msg.kind,
        body: msg.body,
        args,
        target_task_id: msg.target_task_id.parse::<TaskId>()?,
        target_slot: msg.target_slot as usize,
        origin_computer_id: msg.origin_computer_id,
    })
}

fn successor_to_proto(s: &SuccessorTask) -> Result<proto::SuccessorTaskMsg, FabricError> {
    let args = s
        .args
        .iter()
        .map(|slot| -> Result<proto::OptionalValue, FabricError> {
            Ok(match slot {
                Some(v) => proto::OptionalValue {
                    present: true,
                    value: encode_value(v)?,
                },
                None => proto::OptionalValue {
                    present: false,
                    value: Vec::new(),
                },
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(proto::SuccessorTaskMsg {
        id: s.id.to_string(),
        layer: s.layer,
        kind: s.kind.clone(),
        body: s.body.clone(),
        args,
        pending_count: s.pending_count,
        target_task_id: s.target_task_id.to_string(),
        target_slot: s.target_slot as u32,
        origin_computer_id: s.origin_computer_id,
    })
}

fn successor_from_proto(msg: proto::SuccessorTaskMsg) -> Result<SuccessorTask, FabricError> {
    let args = msg
        .args
        .into_iter()
        .map(|v| -> Result<Option<serde_json::Value>, FabricError> {
            if v.present {
                Ok(Some(decode_value(&v.value)?))
            } else {
                Ok(None)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SuccessorTask {
        id: msg.id.parse::<TaskId>()?,
        layer: msg.layer,
        kind: msg.kind,
        body: msg.body,
        args,
        pending_count: msg.pending_count,
        target_task_id: msg.target_task_id.parse::<TaskId>()?,
        target_slot: msg.target_slot as usize,
        origin_computer_id: msg.origin_computer_id,
    })
}

pub fn result_to_proto(result: &TaskResult) -> Result<proto::ResultMsg, FabricError> {
    let kind = match result {
        TaskResult::Coarse(c) => proto::result_msg::Kind::Coarse(proto::CoarseResultMsg {
            origin_task_id: c.origin_task_id.to_string(),
            child_tasks: c
                .child_tasks
                .iter()
                .map(task_to_proto)
                .collect::<Result<Vec<_>, _>>()?,
            successor: Some(successor_to_proto(&c.successor)?),
        }),
        TaskResult::Value(v) => proto::result_msg::Kind::Value(proto::ValueResultMsg {
            origin_task_id: v.origin_task_id.to_string(),
            target_task_id: v.target_task_id.to_string(),
            slot_index: v.slot_index as u32,
            value: encode_value(&v.value)?,
        }),
    };
    Ok(proto::ResultMsg { kind: Some(kind) })
}

pub fn result_from_proto(msg: proto::ResultMsg) -> Result<TaskResult, FabricError> {
    let kind = msg
        .kind
        .ok_or_else(|| FabricError::Codec("ResultMsg missing oneof".into()))?;
    match kind {
        proto::result_msg::Kind::Coarse(c) => {
            let successor = c
                .successor
                .ok_or_else(|| FabricError::Codec("CoarseResultMsg missing successor".into()))?;
            Ok(TaskResult::Coarse(CoarseResult {
                origin_task_id: c.origin_task_id.parse::<TaskId>()?,
                child_tasks: c
                    .child_tasks
                    .into_iter()
                    .map(task_from_proto)
                    .collect::<Result<Vec<_>, _>>()?,
                successor: successor_from_proto(successor)?,
            }))
        }
        proto::result_msg::Kind::Value(v) => Ok(TaskResult::Value(ValueResult {
            origin_task_id: v.origin_task_id.parse::<TaskId>()?,
            target_task_id: v.target_task_id.parse::<TaskId>()?,
            slot_index: v.slot_index as usize,
            value: decode_value(&v.value)?,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_round_trips_through_proto() {
        let task = Task::new_leaf(TaskId::assign_universe(1, 0, 1), 2, "leaf", vec![9, 9]);
        let proto = task_to_proto(&task).unwrap();
        let back = task_from_proto(proto).unwrap();
        assert_eq!(back.id, task.id);
        assert_eq!(back.kind, task.kind);
        assert_eq!(back.body, task.body);
    }

    #[test]
    fn coarse_result_round_trips_through_proto() {
        let successor = SuccessorTask::new(
            TaskId::assign_universe(1, 0, 1).as_successor(),
            0,
            "sum",
            vec![],
            2,
            TaskId::assign_universe(1, 0, 1),
            0,
            Some(3),
        );
        let result = TaskResult::Coarse(CoarseResult {
            origin_task_id: TaskId::assign_universe(1, 0, 1),
            child_tasks: vec![Task::new_leaf(
                TaskId::assign_universe(2, 0, 1),
                1,
                "leaf",
                vec![],
            )],
            successor,
        });
        let proto = result_to_proto(&result).unwrap();
        let back = result_from_proto(proto).unwrap();
        match back {
            TaskResult::Coarse(c) => {
                assert_eq!(c.child_tasks.len(), 1);
                assert_eq!(c.successor.origin_computer_id, Some(3));
            }
            _ => panic!("expected coarse result"),
        }
    }
}
