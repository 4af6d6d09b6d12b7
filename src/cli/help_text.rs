pub(super) const ROOT_LONG_ABOUT: &str = "\
File integrity monitor: baseline SHA-256 digests, scan and watch for changes

Integriward records a SHA-256 digest for every file you ask it to track (the
baseline) and later tells you which of those files are unchanged, changed,
removed, or could not be read. It can also watch the tracked files and report
changes as they happen.

CORE CONCEPTS:

  Baseline:
    A single TOML record mapping the absolute path of every tracked file to its
    expected digest. Paths are normalized, so a file reached through a symlinked
    directory or a relative path is still the same entry. The record is always
    replaced atomically; an interrupted write leaves the previous one intact.

  Scan classifications:
    M  changed     content differs from the baseline
    R  removed     file no longer exists (or is no longer a regular file)
    ?  unknown     file exists but could not be read
    .  unchanged   content matches the baseline

  Accepting:
    Nothing in the baseline changes on its own. A changed or removed file stays
    reported until you accept it, which records the current state as the new
    expected one.

TYPICAL WORKFLOW:

  1. Track some files:
     $ integriward add ~/.ssh/config /etc/hosts ~/bin

  2. Later, check what changed:
     $ integriward scan

  3. Accept the changes you expected:
     $ integriward accept --fingerprint <FINGERPRINT from scan>

  4. Or keep an eye on the files continuously:
     $ integriward watch

BASELINE LOCATION:

  By default the baseline lives in the per-user data directory. Use
  --baseline <PATH> or the INTEGRIWARD_BASELINE environment variable to keep
  several independent baselines.

  If the record cannot be parsed it is copied aside (as
  <record>.corrupt-<timestamp>) and an empty baseline is used, with a warning.
  A record written by a newer version is never touched.

EXIT CODES:

  0    Success, or scan found no differences
  1    Scan found differences
  255  Any error

For detailed help on any command, use:
  integriward <command> --help
";

pub(super) const ADD_LONG_ABOUT: &str = "\
Start tracking files, or every file below a directory

Each file is fingerprinted and its digest stored in the baseline. Adding a file
that is already tracked records its current content as the new baseline.

A directory is walked recursively. Every regular file below it that is not yet
tracked is added; files that are already tracked keep their baseline. Symlinks
are not followed and the baseline record itself is never tracked.

A file that exists but cannot be read is tracked without a digest and shows up
as changed until it is accepted.

EXAMPLES:

  $ integriward add /etc/hosts
  $ integriward add ~/documents
";

pub(super) const SCAN_LONG_ABOUT: &str = "\
Compare tracked files against the baseline

Every tracked file is fingerprinted again and compared with its recorded
digest. Unreadable files do not stop the scan; they are reported with '?' and
the reason.

OUTPUT:

  M  /home/user/notes.txt
  R  /home/user/old.log
  ?  /home/user/locked.bin
     error: Permission denied: /home/user/locked.bin

  Fingerprint: 2J9kq8...

Lines are grouped by classification and sorted by path. Use --all to also list
unchanged files ('.').

FINGERPRINTS:

The fingerprint identifies the exact set of differences reported. Passing it to
'accept --fingerprint' guarantees that what gets accepted is what you reviewed:
if anything changed in between, accept refuses and changes nothing.

The scan exits with 1 if any file is changed, removed or unknown.
";

pub(super) const ACCEPT_LONG_ABOUT: &str = "\
Fold changed and removed files into the baseline

Rescans the tracked files and accepts their current state:

  changed   the digest is recomputed now and stored
  removed   the entry is deleted and the file is no longer tracked
  unknown   skipped with a warning; there is no state to accept

Without PATH arguments every changed and removed file is accepted. With PATH
arguments only those files are, and each of them must be tracked.

Accepting is idempotent: accepting a file that already matches the baseline
does nothing.

EXAMPLES:

  # Accept exactly what a previous scan showed
  $ integriward scan
  $ integriward accept --fingerprint 2J9kq8...

  # Accept a single file
  $ integriward accept /etc/hosts
";

pub(super) const RENAME_LONG_ABOUT: &str = "\
Move the baseline entry of a tracked file to a new path

Renames cannot be detected from content and paths alone: a moved file scans as
one removed file plus an untracked one. If you know a file was moved, rename
carries its recorded digest over to the new path.

Renaming again after the entry has already moved does nothing. Renaming onto a
path that is already tracked is refused.

EXAMPLE:

  $ mv report.txt archive/report.txt
  $ integriward rename report.txt archive/report.txt
";

pub(super) const WATCH_LONG_ABOUT: &str = "\
Watch tracked files and report changes as they happen

The parent directory of every tracked file is watched (not recursively).
Events for files that are not tracked are ignored. A burst of events for the
same file, e.g. an editor writing a temporary file and renaming it over the
original, is reported once after the file has been quiet for --debounce-ms.

Each change is reported as a warning: created, modified or deleted. A move is
reported as a deletion of the old path and a creation of the new one.

By default the baseline is left alone and changes stay visible to 'scan'.
With --auto-accept every reported change is accepted immediately, which means
nothing will flag it later; only use it for files you expect to change.

The watch runs until it receives Ctrl+C or SIGTERM, or for --duration
seconds. Changes still inside their quiet window at that point are reported
before it exits.
";
