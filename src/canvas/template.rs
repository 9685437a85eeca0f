//! Default init canvases for freshly created workflows.

/// Well-known Entry output carrying the user's chat query in ChatFlow mode.
pub const USER_INPUT_KEY: &str = "USER_INPUT";
/// Well-known Entry output binding the request to a conversation.
pub const CONVERSATION_NAME_KEY: &str = "CONVERSATION_NAME";

const INIT_CANVAS: &str = r#"{
 "nodes": [
  {
   "id": "100001",
   "type": "1",
   "meta": {"position": {"x": 0, "y": 0}},
   "data": {
    "nodeMeta": {
     "title": "Start",
     "description": "The starting node of the workflow, used to set the information needed to initiate the workflow."
    },
    "outputs": [
     {"type": "string", "name": "input", "required": false}
    ]
   }
  },
  {
   "id": "900001",
   "type": "2",
   "meta": {"position": {"x": 1000, "y": 0}},
   "data": {
    "nodeMeta": {
     "title": "End",
     "description": "The final node of the workflow, used to return the result information after the workflow runs."
    },
    "inputs": {
     "terminatePlan": "returnVariables",
     "inputParameters": [
      {
       "name": "output",
       "input": {
        "type": "string",
        "value": {
         "type": "ref",
         "content": {"source": "block-output", "blockID": "", "name": ""}
        }
       }
      }
     ]
    }
   }
  }
 ],
 "edges": [],
 "versions": {"loop": "v2"}
}"#;

const INIT_CANVAS_CHAT: &str = r#"{
 "nodes": [
  {
   "id": "100001",
   "type": "1",
   "meta": {"position": {"x": 0, "y": 0}},
   "data": {
    "nodeMeta": {
     "title": "Start",
     "description": "The starting node of the workflow, used to set the information needed to initiate the workflow."
    },
    "outputs": [
     {"type": "string", "name": "USER_INPUT", "required": true},
     {
      "type": "string",
      "name": "CONVERSATION_NAME",
      "required": false,
      "description": "The conversation bound to this request; messages are written to it and history is read from it.",
      "defaultValue": "%CONVERSATION%"
     }
    ]
   }
  },
  {
   "id": "900001",
   "type": "2",
   "meta": {"position": {"x": 1000, "y": 0}},
   "data": {
    "nodeMeta": {
     "title": "End",
     "description": "The final node of the workflow, used to return the result information after the workflow runs."
    },
    "inputs": {
     "terminatePlan": "useAnswerContent",
     "streamingOutput": true,
     "inputParameters": [
      {
       "name": "output",
       "input": {"type": "string", "value": {"type": "ref"}}
      }
     ]
    }
   }
  }
 ],
 "edges": []
}"#;

/// Initial canvas for a plain workflow: Entry with one string input, Exit
/// returning variables.
pub fn default_init_canvas() -> String {
    INIT_CANVAS.to_string()
}

/// Initial canvas for a chat flow: Entry exposing `USER_INPUT` and
/// `CONVERSATION_NAME`, Exit in answer mode with streaming output.
pub fn default_init_canvas_chat(default_conversation: &str) -> String {
    INIT_CANVAS_CHAT.replace("%CONVERSATION%", default_conversation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Canvas, TerminatePlan, Variable, ENTRY_NODE_ID, EXIT_NODE_ID};

    #[test]
    fn test_default_canvas_parses() {
        let canvas: Canvas = serde_json::from_str(&default_init_canvas()).unwrap();
        assert_eq!(canvas.nodes.len(), 2);
        assert_eq!(canvas.nodes[0].id, ENTRY_NODE_ID);
        assert_eq!(canvas.nodes[1].id, EXIT_NODE_ID);
        assert!(canvas.edges.is_empty());
    }

    #[test]
    fn test_chat_canvas_has_well_known_fields() {
        let canvas: Canvas =
            serde_json::from_str(&default_init_canvas_chat("Default")).unwrap();
        let entry = &canvas.nodes[0];
        let names: Vec<String> = entry
            .data
            .outputs
            .iter()
            .map(|o| Variable::parse(o).unwrap().name)
            .collect();
        assert!(names.contains(&USER_INPUT_KEY.to_string()));
        assert!(names.contains(&CONVERSATION_NAME_KEY.to_string()));

        let exit = &canvas.nodes[1];
        let inputs = exit.data.inputs.as_ref().unwrap();
        assert_eq!(inputs.terminate_plan, Some(TerminatePlan::UseAnswerContent));
        assert!(inputs.streaming_output);
    }

    #[test]
    fn test_chat_canvas_conversation_default_substituted() {
        let canvas: Canvas = serde_json::from_str(&default_init_canvas_chat("Main")).unwrap();
        let entry = &canvas.nodes[0];
        let conv = entry
            .data
            .outputs
            .iter()
            .map(|o| Variable::parse(o).unwrap())
            .find(|v| v.name == CONVERSATION_NAME_KEY)
            .unwrap();
        assert_eq!(conv.default_value, Some(serde_json::json!("Main")));
    }
}
