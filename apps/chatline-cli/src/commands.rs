/// One line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Join(String),
    Leave,
    Quit,
    Say(String),
    Nothing,
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Nothing;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Say(line.to_string());
    };
    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };
    match name {
        "join" => Input::Join(rest.to_string()),
        "leave" => Input::Leave,
        "quit" | "exit" => Input::Quit,
        // "//text" sends a literal leading slash.
        _ if command.starts_with('/') => Input::Say(command.to_string()),
        _ => Input::Say(line.to_string()),
    }
}
