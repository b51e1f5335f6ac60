//! Periodic command vocabulary — one-octet tags for every packet.
//!
//! These values ARE the protocol. The server assigns meaning to each tag and
//! both sides must agree on the numbering; changing anything here is a
//! breaking change against every deployed periodic server.

use std::fmt;

/// One-octet command tag carried in every packet payload.
///
/// Direction is noted per variant: `c` client, `w` worker, `s` server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// s→w: wake a sleeping worker.
    Noop = 0,
    /// w→s: request the next job.
    GrabJob = 1,
    /// w→s: reschedule a running job after a delay.
    SchedLater = 2,
    /// w→s: report a job finished, optionally with result bytes.
    WorkDone = 3,
    /// w→s: report a job failed.
    WorkFail = 4,
    /// s→w: a job assignment, body is an encoded Job record.
    JobAssign = 5,
    /// s→w: no job available for a grab.
    NoJob = 6,
    /// w→s: register a function this worker can perform.
    CanDo = 7,
    /// w→s: unregister a function.
    CantDo = 8,
    /// c/w→s: liveness probe.
    Ping = 9,
    /// s→c/w: reply to Ping.
    Pong = 10,
    /// s→w: tell the worker to sleep.
    Sleep = 11,
    /// s→*: unknown or malformed request.
    Unknown = 12,
    /// c→s: submit a job, body is an encoded Job record.
    SubmitJob = 13,
    /// c→s: request per-function queue statistics.
    Status = 14,
    /// c→s: drop a function with no registered workers.
    DropFunc = 15,
    /// s→c/w: generic acknowledgement.
    Success = 16,
    /// c→s: remove a job by (func, name).
    RemoveJob = 17,
    /// c→s: stream the server's data, terminated by an `EOF` body.
    Dump = 18,
    /// c→s: load previously dumped data back into the server.
    Load = 19,
    /// c→s: shut the server down.
    Shutdown = 20,
    /// w→s: register a broadcast function (every worker gets the job).
    Broadcast = 21,
    /// c→s: read a server config value.
    ConfigGet = 22,
    /// c→s: write a server config value.
    ConfigSet = 23,
    /// s→c: config value reply.
    Config = 24,
    /// c→s: run a job synchronously; reply is Data or NoWorker.
    RunJob = 25,
    /// s→w: lock acquisition result, one body byte (1 = acquired).
    Acquired = 26,
    /// w→s: acquire a named job-level lock.
    Acquire = 27,
    /// w→s: release a named job-level lock.
    Release = 28,
    /// s→c: no worker registered for a RunJob function.
    NoWorker = 29,
    /// s→c: RunJob result payload.
    Data = 30,
}

impl Command {
    /// Decode a wire tag. Tags this revision does not know map to `Unknown`
    /// rather than failing — a newer server degrades to a per-request
    /// protocol error instead of killing the connection.
    pub fn from_wire(tag: u8) -> Command {
        match tag {
            0 => Command::Noop,
            1 => Command::GrabJob,
            2 => Command::SchedLater,
            3 => Command::WorkDone,
            4 => Command::WorkFail,
            5 => Command::JobAssign,
            6 => Command::NoJob,
            7 => Command::CanDo,
            8 => Command::CantDo,
            9 => Command::Ping,
            10 => Command::Pong,
            11 => Command::Sleep,
            13 => Command::SubmitJob,
            14 => Command::Status,
            15 => Command::DropFunc,
            16 => Command::Success,
            17 => Command::RemoveJob,
            18 => Command::Dump,
            19 => Command::Load,
            20 => Command::Shutdown,
            21 => Command::Broadcast,
            22 => Command::ConfigGet,
            23 => Command::ConfigSet,
            24 => Command::Config,
            25 => Command::RunJob,
            26 => Command::Acquired,
            27 => Command::Acquire,
            28 => Command::Release,
            29 => Command::NoWorker,
            30 => Command::Data,
            _ => Command::Unknown,
        }
    }

    /// The wire name, as the protocol documentation spells it.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Noop => "NOOP",
            Command::GrabJob => "GRAB_JOB",
            Command::SchedLater => "SCHED_LATER",
            Command::WorkDone => "WORK_DONE",
            Command::WorkFail => "WORK_FAIL",
            Command::JobAssign => "JOB_ASSIGN",
            Command::NoJob => "NO_JOB",
            Command::CanDo => "CAN_DO",
            Command::CantDo => "CANT_DO",
            Command::Ping => "PING",
            Command::Pong => "PONG",
            Command::Sleep => "SLEEP",
            Command::Unknown => "UNKNOWN",
            Command::SubmitJob => "SUBMIT_JOB",
            Command::Status => "STATUS",
            Command::DropFunc => "DROP_FUNC",
            Command::Success => "SUCCESS",
            Command::RemoveJob => "REMOVE_JOB",
            Command::Dump => "DUMP",
            Command::Load => "LOAD",
            Command::Shutdown => "SHUTDOWN",
            Command::Broadcast => "BROADCAST",
            Command::ConfigGet => "CONFIG_GET",
            Command::ConfigSet => "CONFIG_SET",
            Command::Config => "CONFIG",
            Command::RunJob => "RUN_JOB",
            Command::Acquired => "ACQUIRED",
            Command::Acquire => "ACQUIRE",
            Command::Release => "RELEASE",
            Command::NoWorker => "NO_WORKER",
            Command::Data => "DATA",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Command> for u8 {
    fn from(c: Command) -> u8 {
        c as u8
    }
}

/// Role byte sent once at connection setup, framed as a packet of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientType {
    /// Submits, runs, and administers jobs.
    Client = 1,
    /// Registers functions and executes assigned jobs.
    Worker = 2,
}

impl From<ClientType> for u8 {
    fn from(t: ClientType) -> u8 {
        t as u8
    }
}
